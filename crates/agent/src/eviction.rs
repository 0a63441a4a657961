//! Log retention: the two-stage eviction policy.
//!
//! 1. **Function cap**: keep only the newest `max_function_entries`
//!    `function` entries.
//! 2. **Cost budget**: while the log's total cost is at or above
//!    `max_total_cost`, drop the oldest entry after the anchor.
//!
//! Index 0 is never removed by either stage. The policy is pure: it takes a
//! log and returns a new one, so callers decide what to persist.

use parley_config::EvictionConfig;
use parley_core::error::EvictionError;
use parley_core::message::{Message, MessageLog, Role};
use tracing::debug;

use crate::cost::CostModel;

/// Process-wide retention budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionBudgets {
    pub max_function_entries: usize,
    pub max_total_cost: usize,
}

impl Default for EvictionBudgets {
    fn default() -> Self {
        Self::from(&EvictionConfig::default())
    }
}

impl From<&EvictionConfig> for EvictionBudgets {
    fn from(config: &EvictionConfig) -> Self {
        Self {
            max_function_entries: config.max_function_entries,
            max_total_cost: config.max_total_cost,
        }
    }
}

/// Result of one eviction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionOutcome {
    /// The retained log
    pub log: MessageLog,
    /// Function entries dropped by the cap
    pub removed_function_entries: usize,
    /// Entries dropped to get under the cost budget
    pub removed_for_cost: usize,
    /// Total cost of the retained log
    pub total_cost: usize,
}

impl EvictionOutcome {
    pub fn removed(&self) -> usize {
        self.removed_function_entries + self.removed_for_cost
    }

    /// Whether the retained log differs from the input.
    pub fn changed(&self) -> bool {
        self.removed() > 0
    }

    /// Still at or over budget with nothing left to remove but the anchor.
    pub fn over_budget(&self, budgets: &EvictionBudgets) -> bool {
        self.total_cost >= budgets.max_total_cost
    }
}

/// Apply both retention stages to `log`.
///
/// Idempotent: feeding the returned log back in with the same budgets
/// removes nothing. A malformed entry aborts the pass with
/// [`EvictionError::InconsistentLog`] and nothing is removed.
pub fn evict(
    log: &MessageLog,
    budgets: &EvictionBudgets,
    cost: &dyn CostModel,
) -> Result<EvictionOutcome, EvictionError> {
    if log.len() <= 1 {
        return Ok(EvictionOutcome {
            log: log.clone(),
            removed_function_entries: 0,
            removed_for_cost: 0,
            total_cost: cost.total_cost(log),
        });
    }

    check_integrity(log)?;

    // Stage 1: function cap. Index 0 is never a candidate.
    let function_count = log.iter().skip(1).filter(|m| m.is_function()).count();
    let mut excess = function_count.saturating_sub(budgets.max_function_entries);
    let removed_function_entries = excess;

    let mut kept: Vec<Message> = Vec::with_capacity(log.len() - excess);
    for (i, message) in log.iter().enumerate() {
        if i > 0 && excess > 0 && message.is_function() {
            excess -= 1;
            continue;
        }
        kept.push(message.clone());
    }

    // Stage 2: cost budget, oldest non-anchor first.
    let costs: Vec<usize> = kept.iter().map(|m| cost.message_cost(m)).collect();
    let mut total: usize = costs.iter().sum();
    let mut drop_count = 0;
    while total >= budgets.max_total_cost && 1 + drop_count < kept.len() {
        total -= costs[1 + drop_count];
        drop_count += 1;
    }
    kept.drain(1..1 + drop_count);

    if removed_function_entries + drop_count > 0 {
        debug!(
            removed_function_entries,
            removed_for_cost = drop_count,
            remaining = kept.len(),
            total_cost = total,
            "Evicted log entries"
        );
    }

    Ok(EvictionOutcome {
        log: MessageLog::from_messages(kept),
        removed_function_entries,
        removed_for_cost: drop_count,
        total_cost: total,
    })
}

/// Reject entries whose `name` contradicts their role.
fn check_integrity(log: &MessageLog) -> Result<(), EvictionError> {
    for (index, message) in log.iter().enumerate() {
        match (message.role, message.name.as_deref()) {
            (Role::Function, None) | (Role::Function, Some("")) => {
                return Err(EvictionError::InconsistentLog {
                    index,
                    reason: "function entry without a tool name".into(),
                });
            }
            (Role::Function, Some(_)) => {}
            (role, Some(name)) => {
                return Err(EvictionError::InconsistentLog {
                    index,
                    reason: format!("{role} entry carries tool name '{name}'"),
                });
            }
            (_, None) => {}
        }
    }
    Ok(())
}
