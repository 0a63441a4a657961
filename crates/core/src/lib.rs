//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley conversation
//! engine. This crate has **zero framework dependencies**: it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator at the edge of the engine (model provider, session
//! storage, reply transport, tools) is a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use channel::{ImageSource, ReplyChannel};
pub use error::{Error, ExchangeError, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{Content, Message, MessageLog, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use session::{SessionId, SessionStore};
pub use tool::{Tool, ToolCall, ToolContext, ToolContract, ToolRegistry};
