//! Message and message-log domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the transport hands over user text → the loop appends it to the session's
//! log → the provider sees the log → tool results and replies are appended.

use serde::{Deserialize, Serialize};
use std::ops::Deref;

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (the anchor entry)
    System,
    /// The end user
    User,
    /// The model's text reply
    Assistant,
    /// Result of a tool invocation
    Function,
}

impl Role {
    /// Wire label for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Function => "function",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message content: plain text or an arbitrary structured value.
///
/// Serialized untagged, so a stored log reads as `"content": "hi"` or
/// `"content": {"temp": 21}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Structured(serde_json::Value),
}

impl Content {
    /// The textual form of this content. Structured values are serialized
    /// to compact JSON.
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(text) => text.clone(),
            Content::Structured(value) => value.to_string(),
        }
    }

    /// Whether the content is absent for practical purposes.
    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Structured(value) => value.is_null(),
        }
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<serde_json::Value> for Content {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Content::Text(s),
            other => Content::Structured(other),
        }
    }
}

/// A single entry in a session's message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this entry
    pub role: Role,

    /// The entry content
    pub content: Content,

    /// Tool name; only set for `function` entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<Content>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            name: None,
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<Content>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            name: None,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<Content>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            name: None,
        }
    }

    /// Create a tool result entry.
    pub fn function(name: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            role: Role::Function,
            content: content.into(),
            name: Some(name.into()),
        }
    }

    pub fn is_function(&self) -> bool {
        self.role == Role::Function
    }
}

/// The ordered, role-tagged entries of one session.
///
/// Index 0, when it is a `system` entry, is the anchor: it seeds model
/// behavior and no retention policy may remove it. The log only grows
/// through [`MessageLog::push`]; shrinking is the eviction policy's job,
/// which builds a fresh log with [`MessageLog::from_messages`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog(Vec<Message>);

impl MessageLog {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// A fresh log holding only the anchor entry.
    pub fn seeded(system_prompt: impl Into<Content>) -> Self {
        Self(vec![Message::system(system_prompt)])
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self(messages)
    }

    /// Append an entry at the end of the log.
    pub fn push(&mut self, message: Message) {
        self.0.push(message);
    }

    /// Append several entries, preserving their order.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.0.extend(messages);
    }

    /// The anchor entry, if index 0 holds a system message.
    pub fn anchor(&self) -> Option<&Message> {
        self.0.first().filter(|m| m.role == Role::System)
    }

    /// Number of `function` entries in the log.
    pub fn function_count(&self) -> usize {
        self.0.iter().filter(|m| m.is_function()).count()
    }

    /// Replace the anchor's content wholesale (external prompt refresh).
    ///
    /// If the log has no anchor yet, one is inserted at index 0. Returns
    /// `true` when the log changed.
    pub fn replace_anchor_content(&mut self, system_prompt: impl Into<Content>) -> bool {
        let content = system_prompt.into();
        match self.0.first_mut() {
            Some(first) if first.role == Role::System => {
                if first.content == content {
                    return false;
                }
                first.content = content;
                true
            }
            _ => {
                self.0.insert(0, Message::system(content));
                true
            }
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.0
    }
}

impl Deref for MessageLog {
    type Target = [Message];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<Message>> for MessageLog {
    fn from(messages: Vec<Message>) -> Self {
        Self(messages)
    }
}
