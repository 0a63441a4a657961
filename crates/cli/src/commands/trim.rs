//! `parley trim`: one trimmer pass over every stored session.

use std::sync::Arc;

use parley_agent::SessionLocks;
use parley_core::event::EventBus;
use parley_workflow::TrimmerService;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let store = super::open_store(&config).await?;
    let trimmer = TrimmerService::from_config(
        &config,
        store,
        SessionLocks::new(),
        Arc::new(EventBus::default()),
    )?;

    let report = trimmer.run_once().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
