//! The orchestration engine: the heart of Parley.
//!
//! One exchange follows a **model → tools → model** cycle:
//!
//! 1. **Receive** a user message for a session (from any transport)
//! 2. **Send** the session's log plus the tool catalog to the model
//! 3. **If tool calls**: dispatch them, append one `function` entry per
//!    tool, and either stop (a terminating tool ran) or go back to step 2
//! 4. **If text**: append it as the assistant reply and return it
//!
//! When an exchange completes, the log is trimmed by the two-stage
//! eviction policy and saved. The same policy runs periodically from the
//! background trimmer in `parley-workflow`.

pub mod cost;
pub mod dispatcher;
pub mod eviction;
pub mod loop_runner;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use cost::{CostModel, HeuristicCost, build_cost_model, estimate_tokens};
#[cfg(feature = "tiktoken")]
pub use cost::TiktokenCost;
pub use dispatcher::{DispatchOutcome, ToolDispatcher};
pub use eviction::{EvictionBudgets, EvictionOutcome, evict};
pub use loop_runner::{AgentLoop, ExchangeOutcome};
pub use sessions::SessionLocks;
