//! `send_random_image`: sends a random picture with the model's answer as
//! the caption.
//!
//! Registered as terminating and context-accepting: the tool itself delivers
//! the reply through the transport, so the model is not asked for more text.

use async_trait::async_trait;
use parley_core::channel::ImageSource;
use parley_core::error::ToolError;
use parley_core::tool::{Tool, ToolContext};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const DEFAULT_SIZE: u64 = 400;
const MAX_SIZE: u64 = 5000;

pub struct SendRandomImageTool {
    base_url: String,
}

impl SendRandomImageTool {
    pub fn new() -> Self {
        Self {
            base_url: "https://picsum.photos".into(),
        }
    }

    /// Use a different image service (same `<base>/<size>` URL shape).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn image_url(&self, size: u64) -> String {
        format!("{}/{size}", self.base_url)
    }
}

impl Default for SendRandomImageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SendRandomImageTool {
    fn name(&self) -> &str {
        "send_random_image"
    }

    fn description(&self) -> &str {
        "Send the user a random picture together with your answer as its caption. \
         Use it when the user asks for an image. Your answer is delivered with the \
         picture, so do not repeat it afterwards."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "Your reply to the user, sent as the image caption"
                },
                "size": {
                    "type": "integer",
                    "description": "Square image size in pixels (default 400)"
                }
            },
            "required": ["answer"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        ctx: Option<&ToolContext>,
    ) -> Result<Value, ToolError> {
        let answer = arguments
            .get("answer")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'answer' argument".into()))?;

        let size = match arguments.get("size") {
            None | Some(Value::Null) => DEFAULT_SIZE,
            Some(v) => v
                .as_u64()
                .filter(|s| (1..=MAX_SIZE).contains(s))
                .ok_or_else(|| {
                    ToolError::InvalidArguments(format!(
                        "'size' must be an integer between 1 and {MAX_SIZE}"
                    ))
                })?,
        };

        let Some(channel) = ctx.and_then(|c| c.channel.as_ref()) else {
            return Ok(serde_json::json!({ "error": "no reply channel available" }));
        };

        let url = self.image_url(size);
        debug!(channel = channel.name(), %url, "Sending random image");

        match channel.send_image(ImageSource::url(url), Some(answer)).await {
            Ok(()) => Ok(serde_json::json!({ "status": "image sent" })),
            Err(e) => {
                warn!(error = %e, "Image delivery failed");
                Ok(serde_json::json!({ "error": e.to_string() }))
            }
        }
    }
}
