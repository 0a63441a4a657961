//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`ExchangeError`] is the
//! terminal error outcome of one orchestration pass.

use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Channel errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Orchestration errors ---
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    // --- Eviction errors ---
    #[error("Eviction error: {0}")]
    Eviction(#[from] EvictionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(String),

    #[error("Stored session is not valid JSON: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// Raised by the eviction policy when the log it walks is malformed.
///
/// Eviction is aborted for that log and the log is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvictionError {
    #[error("Inconsistent message log at index {index}: {reason}")]
    InconsistentLog { index: usize, reason: String },
}

/// Terminal error outcome of one orchestration pass.
///
/// Tool-level failures never show up here: they are folded into the
/// conversation as `function` entries carrying an `error` field.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("User message is empty")]
    EmptyInput,

    #[error("No content in response")]
    NoContent,

    #[error("Exchange exceeded the limit of {limit} model rounds")]
    LoopExceeded { limit: u32 },

    #[error("Model provider unavailable: {0}")]
    Provider(#[from] ProviderError),

    #[error("{stage} did not finish within {secs}s")]
    Timeout { stage: String, secs: u64 },

    #[error("Session storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl ExchangeError {
    /// Short stable tag handed to the transport layer.
    pub fn tag(&self) -> &'static str {
        match self {
            ExchangeError::EmptyInput => "empty_input",
            ExchangeError::NoContent => "no_content",
            ExchangeError::LoopExceeded { .. } => "loop_exceeded",
            ExchangeError::Provider(_) => "provider_unavailable",
            ExchangeError::Timeout { .. } => "timeout",
            ExchangeError::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn tool_error_messages_name_the_failure() {
        let err = ToolError::ExecutionFailed {
            tool_name: "get_weather".into(),
            reason: "upstream down".into(),
        };
        assert_eq!(err.to_string(), "Tool execution failed: get_weather: upstream down");
        let err = ToolError::InvalidArguments("Missing 'city' argument".into());
        assert!(err.to_string().starts_with("Invalid tool arguments"));
    }

    #[test]
    fn inconsistent_log_names_the_index() {
        let err = EvictionError::InconsistentLog {
            index: 4,
            reason: "function entry without a name".into(),
        };
        assert!(err.to_string().contains("index 4"));
        assert!(err.to_string().contains("without a name"));
    }

    #[test]
    fn exchange_error_tags() {
        assert_eq!(ExchangeError::NoContent.tag(), "no_content");
        assert_eq!(ExchangeError::LoopExceeded { limit: 3 }.tag(), "loop_exceeded");
        let timeout = ExchangeError::Timeout {
            stage: "model call".into(),
            secs: 5,
        };
        assert_eq!(timeout.tag(), "timeout");
        assert_eq!(timeout.to_string(), "model call did not finish within 5s");
    }

    #[test]
    fn provider_error_converts_into_exchange_error() {
        let err: ExchangeError = ProviderError::Network("connection reset".into()).into();
        assert_eq!(err.tag(), "provider_unavailable");
        assert!(err.to_string().contains("connection reset"));
    }
}
