//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// System prompt (the anchor entry of every session)
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Orchestration loop limits
    #[serde(default)]
    pub orchestration: OrchestrationConfig,

    /// Log retention budgets
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Background trimmer
    #[serde(default)]
    pub trimmer: TrimmerConfig,

    /// Session storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("identity", &self.identity)
            .field("orchestration", &self.orchestration)
            .field("eviction", &self.eviction)
            .field("trimmer", &self.trimmer)
            .field("storage", &self.storage)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Inline system prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Read the system prompt from this file instead (takes precedence)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,
}

fn default_system_prompt() -> String {
    "You are a friendly assistant in a chat. Keep answers short and plain. \
     Use the available tools when the user asks about the time, the weather, \
     or wants a picture."
        .into()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            system_prompt_file: None,
        }
    }
}

impl IdentityConfig {
    /// The effective system prompt text.
    pub fn resolve_system_prompt(&self) -> Result<String, ConfigError> {
        match &self.system_prompt_file {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                    path: path.clone(),
                    reason: e.to_string(),
                })?;
                Ok(text.trim().to_string())
            }
            None => Ok(self.system_prompt.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Safety ceiling on model rounds per exchange
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_max_iterations() -> u32 {
    25
}
fn default_model_timeout() -> u64 {
    120
}
fn default_tool_timeout() -> u64 {
    30
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

impl OrchestrationConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Which cost function the eviction budget is measured in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostModelKind {
    /// ~4 characters per token
    #[default]
    Heuristic,
    /// BPE token count (cl100k_base)
    Tiktoken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Keep at most this many `function` entries
    #[serde(default = "default_max_function_entries")]
    pub max_function_entries: usize,

    /// Total cost budget for a whole log
    #[serde(default = "default_max_total_cost")]
    pub max_total_cost: usize,

    #[serde(default)]
    pub cost_model: CostModelKind,
}

fn default_max_function_entries() -> usize {
    3
}
fn default_max_total_cost() -> usize {
    50_000
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            max_function_entries: default_max_function_entries(),
            max_total_cost: default_max_total_cost(),
            cost_model: CostModelKind::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimmerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_trim_interval")]
    pub interval_secs: u64,
}

fn default_trim_interval() -> u64 {
    10
}

impl Default for TrimmerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_trim_interval(),
        }
    }
}

impl TrimmerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// One JSON file per session in a directory
    #[default]
    File,
    /// A single SQLite database
    Sqlite,
    /// Process memory only (lost on exit)
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackendKind,

    /// Directory (file backend) or database file (sqlite backend).
    /// Defaults to a location under the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// The effective storage location for the configured backend.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match self.backend {
            StorageBackendKind::Sqlite => AppConfig::config_dir().join("sessions.db"),
            StorageBackendKind::File | StorageBackendKind::Memory => {
                AppConfig::config_dir().join("sessions")
            }
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `PARLEY_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using the given lookup.
    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("PARLEY_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if let Some(provider) = lookup("PARLEY_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("PARLEY_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.eviction.max_total_cost == 0 {
            return Err(ConfigError::ValidationError(
                "eviction.max_total_cost must be > 0".into(),
            ));
        }

        if self.orchestration.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestration.max_iterations must be > 0".into(),
            ));
        }

        if self.orchestration.model_timeout_secs == 0 || self.orchestration.tool_timeout_secs == 0
        {
            return Err(ConfigError::ValidationError(
                "orchestration timeouts must be > 0".into(),
            ));
        }

        if self.trimmer.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "trimmer.interval_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            identity: IdentityConfig::default(),
            orchestration: OrchestrationConfig::default(),
            eviction: EvictionConfig::default(),
            trimmer: TrimmerConfig::default(),
            storage: StorageConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
