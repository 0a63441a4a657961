//! `parley chat`: interactive or single-message mode.

use std::io::Write;
use std::sync::Arc;

use parley_agent::ExchangeOutcome;
use parley_config::AppConfig;
use parley_core::channel::ReplyChannel;
use parley_core::session::SessionId;
use parley_core::tool::ToolContext;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::console::ConsoleChannel;

use super::Runtime;

pub async fn run(session: String, message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;

    // Check for API key early: give a clear error
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PARLEY_API_KEY      (generic)");
        eprintln!("    OPENAI_API_KEY      (OpenAI direct)");
        eprintln!("    OPENROUTER_API_KEY  (OpenRouter)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let runtime = super::build_runtime(config).await?;
    let session_id = SessionId::from(session);
    let channel: Arc<dyn ReplyChannel> = Arc::new(ConsoleChannel::new());

    if let Some(msg) = message {
        exchange(&runtime, &session_id, &channel, &msg).await?;
        return Ok(());
    }

    println!();
    println!("  Parley: Interactive Mode");
    println!();
    println!("  Provider:  {}", runtime.config.default_provider);
    println!("  Model:     {}", runtime.agent.model());
    println!("  Session:   {session_id}");
    println!("  Tools:     {}", runtime.agent.tools().names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        if let Err(e) = exchange(&runtime, &session_id, &channel, line).await {
            eprintln!("  [Error] {e}");
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Run one exchange and present its outcome on the console.
async fn exchange(
    runtime: &Runtime,
    session_id: &SessionId,
    channel: &Arc<dyn ReplyChannel>,
    text: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = ToolContext::new(session_id.clone()).with_channel(channel.clone());

    eprint!("  ...");
    let result = runtime.agent.handle(session_id, text, Some(ctx)).await;
    eprint!("\r     \r");

    match result {
        Ok(ExchangeOutcome::Reply(reply)) => channel.send_text(&reply).await?,
        // The terminating tool already answered through the channel
        Ok(ExchangeOutcome::Terminated) => {}
        Err(e) => eprintln!("  [{}] {e}", e.tag()),
    }
    Ok(())
}
