//! Cost models for the eviction budget.
//!
//! Cost is a deterministic size metric per log entry: the cost of the role
//! label plus the cost of the content text (structured content is first
//! serialized to compact JSON).
//!
//! The default [`HeuristicCost`] uses ~4 characters per token, which stays
//! within ~10% of BPE tokenizers on English text. With the `tiktoken`
//! feature, [`TiktokenCost`] counts cl100k_base tokens exactly.

use parley_config::CostModelKind;
use parley_core::message::Message;
use std::sync::Arc;

/// A deterministic, length-monotonic cost function over log entries.
pub trait CostModel: Send + Sync {
    /// Name shown in logs and status output.
    fn name(&self) -> &str;

    /// Cost of a piece of text.
    fn text_cost(&self, text: &str) -> usize;

    /// Cost of a whole entry: role label plus content.
    fn message_cost(&self, message: &Message) -> usize {
        self.text_cost(message.role.as_str()) + self.text_cost(&message.content.as_text())
    }

    /// Total cost of a slice of entries.
    fn total_cost(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.message_cost(m)).sum()
    }
}

/// Heuristic: 1 token ≈ 4 characters (bytes). Rounds up.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicCost;

/// Estimate the token count for a string.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

impl CostModel for HeuristicCost {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn text_cost(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Exact BPE token counts with the cl100k_base encoding.
#[cfg(feature = "tiktoken")]
pub struct TiktokenCost {
    bpe: tiktoken_rs::CoreBPE,
}

#[cfg(feature = "tiktoken")]
impl TiktokenCost {
    pub fn new() -> Result<Self, parley_core::Error> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| parley_core::Error::Config {
            message: format!("failed to load cl100k_base encoding: {e}"),
        })?;
        Ok(Self { bpe })
    }
}

#[cfg(feature = "tiktoken")]
impl CostModel for TiktokenCost {
    fn name(&self) -> &str {
        "tiktoken"
    }

    fn text_cost(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Build the configured cost model.
pub fn build_cost_model(kind: CostModelKind) -> Result<Arc<dyn CostModel>, parley_core::Error> {
    match kind {
        CostModelKind::Heuristic => Ok(Arc::new(HeuristicCost)),
        #[cfg(feature = "tiktoken")]
        CostModelKind::Tiktoken => Ok(Arc::new(TiktokenCost::new()?)),
        #[cfg(not(feature = "tiktoken"))]
        CostModelKind::Tiktoken => Err(parley_core::Error::Config {
            message: "cost_model = \"tiktoken\" requires the `tiktoken` feature".into(),
        }),
    }
}
