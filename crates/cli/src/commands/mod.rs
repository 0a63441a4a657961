pub mod chat;
pub mod daemon;
pub mod onboard;
pub mod sessions;
pub mod status;
pub mod trim;

use std::sync::Arc;

use parley_agent::{AgentLoop, SessionLocks};
use parley_config::AppConfig;
use parley_core::event::EventBus;
use parley_core::session::SessionStore;

/// Shared pieces one process needs to serve exchanges.
pub struct Runtime {
    pub config: AppConfig,
    pub agent: Arc<AgentLoop>,
    pub store: Arc<dyn SessionStore>,
    pub locks: SessionLocks,
    pub event_bus: Arc<EventBus>,
}

pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn SessionStore>, Box<dyn std::error::Error>> {
    Ok(parley_storage::build_from_config(&config.storage)
        .await
        .map_err(|e| format!("Failed to open session store: {e}"))?)
}

/// Wire provider, tools, storage and the orchestration loop together.
pub async fn build_runtime(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    let provider = parley_providers::build_from_config(&config)?;
    let model = parley_providers::resolve_model(&config);
    let tools = Arc::new(parley_tools::default_registry());
    let store = open_store(&config).await?;
    let locks = SessionLocks::new();
    let event_bus = Arc::new(EventBus::default());

    let agent = AgentLoop::from_config(&config, provider, model, tools, store.clone(), event_bus.clone())?
        .with_locks(locks.clone());

    Ok(Runtime {
        config,
        agent: Arc::new(agent),
        store,
        locks,
        event_bus,
    })
}
