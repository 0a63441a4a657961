//! ReplyChannel trait: the transport's outbound side as seen by tools.
//!
//! The engine itself never talks to a chat platform. A transport (console,
//! Telegram, HTTP, ...) hands a `ReplyChannel` to the loop through the tool
//! context so that context-accepting tools can answer the user directly,
//! for example by sending an image.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Where an image to be sent comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageSource {
    /// A publicly reachable URL the transport can forward as-is
    Url { url: String },
    /// Raw image bytes already downloaded
    Bytes { data: Vec<u8> },
}

impl ImageSource {
    pub fn url(url: impl Into<String>) -> Self {
        ImageSource::Url { url: url.into() }
    }

    /// Payload size when bytes are held in memory.
    pub fn len(&self) -> Option<usize> {
        match self {
            ImageSource::Url { .. } => None,
            ImageSource::Bytes { data } => Some(data.len()),
        }
    }
}

/// Outbound handle onto the originating conversation.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    /// Human-readable channel name (e.g., "console", "telegram").
    fn name(&self) -> &str;

    /// Send a text message to the user.
    async fn send_text(&self, text: &str) -> std::result::Result<(), ChannelError>;

    /// Send an image to the user, with an optional caption.
    async fn send_image(
        &self,
        image: ImageSource,
        caption: Option<&str>,
    ) -> std::result::Result<(), ChannelError>;
}
