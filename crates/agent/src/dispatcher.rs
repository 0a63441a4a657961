//! Tool dispatch: resolve, invoke and package the model's tool calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parley_core::error::ExchangeError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::message::{Content, Message};
use parley_core::tool::{ToolCall, ToolContext, ToolRegistry};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// What one batch of tool calls produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchOutcome {
    /// One `function` entry per invoked tool, in call order
    pub entries: Vec<Message>,

    /// At least one invoked tool ends the exchange
    pub terminate: bool,
}

/// Runs tool calls against a shared, read-only registry.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    tool_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, tool_timeout: Duration, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            tool_timeout,
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute a batch of tool calls sequentially, in the order given.
    ///
    /// Calls naming an unregistered tool are skipped: no entry, no error.
    /// Argument and execution failures become `{"error": ...}` payloads in
    /// that tool's entry. Only a tool exceeding its time limit aborts the
    /// batch.
    pub async fn dispatch(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
    ) -> Result<DispatchOutcome, ExchangeError> {
        let mut outcome = DispatchOutcome::default();

        for call in calls {
            let Some(contract) = self.registry.get(&call.name) else {
                warn!(
                    session_id = %ctx.session_id,
                    tool = %call.name,
                    "Model requested an unknown tool, skipping"
                );
                continue;
            };

            let start = Instant::now();
            let result = match parse_arguments(&call.arguments) {
                Ok(args) => {
                    let injected = contract.accepts_context.then_some(ctx);
                    let execution = contract.tool.execute(args, injected);
                    // Only a tool that actually ran can end the exchange.
                    outcome.terminate |= contract.terminates_exchange;
                    match tokio::time::timeout(self.tool_timeout, execution).await {
                        Ok(Ok(value)) => value,
                        Ok(Err(e)) => {
                            warn!(tool = %call.name, error = %e, "Tool execution failed");
                            error_payload(e.to_string())
                        }
                        Err(_) => {
                            self.publish(ctx, &call.name, false, start);
                            return Err(ExchangeError::Timeout {
                                stage: format!("tool '{}'", call.name),
                                secs: self.tool_timeout.as_secs(),
                            });
                        }
                    }
                }
                Err(reason) => {
                    warn!(tool = %call.name, %reason, "Invalid tool arguments");
                    error_payload(reason)
                }
            };

            let success = !is_error_payload(&result);
            self.publish(ctx, &call.name, success, start);
            debug!(tool = %call.name, success, "Tool finished");

            outcome
                .entries
                .push(Message::function(call.name.clone(), serialize_result(&result)));
        }

        Ok(outcome)
    }

    fn publish(&self, ctx: &ToolContext, tool_name: &str, success: bool, start: Instant) {
        self.event_bus.publish(DomainEvent::ToolExecuted {
            session_id: ctx.session_id.to_string(),
            tool_name: tool_name.to_string(),
            success,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });
    }
}

/// Parse the model's raw argument payload into a JSON object.
///
/// An absent payload (empty, whitespace or `null`) means "no arguments".
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(format!("arguments must be a JSON object, got {other}")),
        Err(e) => Err(format!("malformed arguments: {e}")),
    }
}

fn error_payload(reason: impl Into<String>) -> Value {
    serde_json::json!({ "error": reason.into() })
}

fn is_error_payload(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.len() == 1 && o.contains_key("error"))
}

/// Tool results are stored as their JSON serialization.
fn serialize_result(value: &Value) -> Content {
    Content::Text(value.to_string())
}
