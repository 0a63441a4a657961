//! Console reply channel: the terminal as a transport.

use async_trait::async_trait;
use parley_core::channel::{ImageSource, ReplyChannel};
use parley_core::error::ChannelError;

/// Prints replies to stdout.
#[derive(Default)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }
}

/// Drop `*` and `#` markup characters the model likes to emit.
pub fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '*' | '#')).collect()
}

fn render_reply(text: &str) -> String {
    strip_markup(text)
        .lines()
        .map(|line| format!("  Assistant > {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_image(image: &ImageSource, caption: Option<&str>) -> String {
    let source = match image {
        ImageSource::Url { url } => url.clone(),
        ImageSource::Bytes { data } => format!("{} bytes", data.len()),
    };
    match caption {
        Some(caption) => format!("  [image: {source}]\n{}", render_reply(caption)),
        None => format!("  [image: {source}]"),
    }
}

#[async_trait]
impl ReplyChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_text(&self, text: &str) -> Result<(), ChannelError> {
        println!("{}", render_reply(text));
        Ok(())
    }

    async fn send_image(&self, image: ImageSource, caption: Option<&str>) -> Result<(), ChannelError> {
        println!("{}", render_image(&image, caption));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markup_characters() {
        assert_eq!(strip_markup("**Bold** and # heading"), "Bold and  heading");
        assert_eq!(strip_markup("plain"), "plain");
    }

    #[test]
    fn reply_lines_are_prefixed() {
        assert_eq!(
            render_reply("one\n*two*"),
            "  Assistant > one\n  Assistant > two"
        );
    }

    #[test]
    fn default_console_channel() {
        assert_eq!(ConsoleChannel::default().name(), "console");
        assert_eq!(ConsoleChannel::new().name(), "console");
    }

    #[test]
    fn image_rendering() {
        let url = ImageSource::url("https://picsum.photos/400");
        assert_eq!(
            render_image(&url, Some("A **cat**")),
            "  [image: https://picsum.photos/400]\n  Assistant > A cat"
        );
        assert_eq!(render_image(&url, None), "  [image: https://picsum.photos/400]");
    }
}
