//! Tool trait and the static tool registration table.
//!
//! A tool is a callable the model may request by name. Each tool is
//! registered once at startup inside a [`ToolContract`] that declares two
//! things up front: whether the tool wants the transport context injected,
//! and whether calling it ends the exchange without another model round.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::channel::ReplyChannel;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::session::SessionId;

/// A model-issued request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Raw JSON-encoded arguments, exactly as the model produced them
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// The context value a transport supplies for one exchange.
///
/// Injected only into tools registered with [`ToolContract::with_context`].
#[derive(Clone)]
pub struct ToolContext {
    /// The session the exchange belongs to
    pub session_id: SessionId,

    /// Outbound handle onto the originating chat, if the transport has one
    pub channel: Option<Arc<dyn ReplyChannel>>,

    /// Transport-specific metadata (message id, user name, ...)
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ToolContext {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            channel: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_channel(mut self, channel: Arc<dyn ReplyChannel>) -> Self {
        self.channel = Some(channel);
        self
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("session_id", &self.session_id)
            .field("channel", &self.channel.as_ref().map(|c| c.name().to_string()))
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// The core Tool trait.
///
/// Blocking and suspending tools look the same to the dispatcher: it awaits
/// `execute` either way.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "get_weather").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing the model-supplied parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool.
    ///
    /// `ctx` is `Some` only when the tool is registered as accepting context
    /// and the transport supplied one.
    async fn execute(
        &self,
        arguments: serde_json::Map<String, serde_json::Value>,
        ctx: Option<&ToolContext>,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// Registration record for one tool.
pub struct ToolContract {
    pub tool: Box<dyn Tool>,

    /// Calling this tool ends the exchange after the current batch
    pub terminates_exchange: bool,

    /// The tool receives the transport's [`ToolContext`]
    pub accepts_context: bool,
}

impl ToolContract {
    pub fn new(tool: impl Tool + 'static) -> Self {
        Self {
            tool: Box::new(tool),
            terminates_exchange: false,
            accepts_context: false,
        }
    }

    /// Mark the tool as ending the exchange.
    pub fn terminating(mut self) -> Self {
        self.terminates_exchange = true;
        self
    }

    /// Declare that the tool wants the transport context injected.
    pub fn with_context(mut self) -> Self {
        self.accepts_context = true;
        self
    }

    pub fn name(&self) -> &str {
        self.tool.name()
    }
}

/// A registry of available tools.
///
/// Built once at process start, then shared read-only (`Arc<ToolRegistry>`)
/// by the orchestration loop and the dispatcher.
pub struct ToolRegistry {
    tools: HashMap<String, ToolContract>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build a registry from a static table of contracts.
    pub fn from_contracts(contracts: impl IntoIterator<Item = ToolContract>) -> Self {
        let mut registry = Self::new();
        for contract in contracts {
            registry.register(contract);
        }
        registry
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, contract: ToolContract) {
        let name = contract.name().to_string();
        self.tools.insert(name, contract);
    }

    /// Resolve a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolContract> {
        self.tools.get(name)
    }

    /// Tool catalog for the model, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|c| c.tool.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
