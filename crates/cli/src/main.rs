//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `onboard`  : Initialize config directory and default config
//! - `chat`     : Interactive chat or single-message mode
//! - `sessions` : List stored sessions
//! - `trim`     : Run one background-trimmer pass
//! - `daemon`   : Refresh system prompts, then trim on a schedule
//! - `status`   : Show effective configuration

use clap::{Parser, Subcommand};

mod commands;
mod console;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: tool-calling conversation engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration
    Onboard,

    /// Chat through the orchestration loop
    Chat {
        /// Session to continue (defaults to the console session)
        #[arg(short, long, default_value = "console")]
        session: String,

        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List stored sessions
    Sessions,

    /// Trim every stored session once
    Trim,

    /// Run the background trimmer until Ctrl-C
    Daemon,

    /// Show effective configuration
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Chat { session, message } => commands::chat::run(session, message).await?,
        Commands::Sessions => commands::sessions::run().await?,
        Commands::Trim => commands::trim::run().await?,
        Commands::Daemon => commands::daemon::run().await?,
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
