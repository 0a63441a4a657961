//! `parley daemon`: long-running background maintenance.

use std::sync::Arc;

use parley_core::event::DomainEvent;
use parley_workflow::TrimmerService;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let runtime = super::build_runtime(super::load_config()?).await?;
    let config = &runtime.config;

    println!("Parley Daemon: starting");
    println!("   Store:   {}", runtime.store.name());
    println!(
        "   Trimmer: {}",
        if config.trimmer.enabled {
            format!("every {}s", config.trimmer.interval_secs)
        } else {
            "disabled".into()
        }
    );

    let refreshed = runtime.agent.refresh_system_prompt().await?;
    info!(refreshed, "System prompts refreshed");

    // Log domain events
    let mut events = runtime.event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event log lagging")
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let trimmer_handle = if config.trimmer.enabled {
        let trimmer = TrimmerService::from_config(
            config,
            runtime.store.clone(),
            runtime.locks.clone(),
            runtime.event_bus.clone(),
        )?;
        Some(Arc::new(trimmer).start(shutdown_rx))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = trimmer_handle {
        handle.await?;
    }

    Ok(())
}

fn log_event(event: &DomainEvent) {
    match event {
        DomainEvent::LogTrimmed {
            session_id,
            removed,
            remaining,
            ..
        } => info!(%session_id, removed, remaining, "Session log trimmed"),
        DomainEvent::ErrorOccurred {
            context,
            error_message,
            ..
        } => warn!(%context, %error_message, "Error event"),
        other => debug!(event = ?other, "Domain event"),
    }
}
