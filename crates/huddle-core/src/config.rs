use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HEALTH_PORT: u16 = 8787;
pub const DEFAULT_HEALTH_BIND: &str = "127.0.0.1";
pub const DEFAULT_CONTAINER_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONTAINER_MEMORY_MB: u64 = 2048;
pub const DEFAULT_CONTAINER_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_INTAKE_POLL_MS: u64 = 2_000;
pub const DEFAULT_IPC_POLL_MS: u64 = 1_000;
pub const DEFAULT_SCHEDULER_POLL_SECS: u64 = 60;

/// Top-level config (huddle.toml + HUDDLE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuddleConfig {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Default for HuddleConfig {
    fn default() -> Self {
        Self {
            assistant: AssistantConfig::default(),
            database: DatabaseConfig::default(),
            container: ContainerConfig::default(),
            scheduling: SchedulingConfig::default(),
            embeddings: EmbeddingsConfig::default(),
            paths: PathsConfig::default(),
            health: HealthConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

/// Display identity the agent uses when addressing chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub display_name: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            display_name: default_assistant_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Sandbox container image and resource limits for the Container Runner (C5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    #[serde(default = "default_container_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_container_memory_mb")]
    pub memory_mb: u64,
    #[serde(default = "default_container_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            image_tag: default_image_tag(),
            timeout_secs: default_container_timeout_secs(),
            memory_mb: default_container_memory_mb(),
            max_output_bytes: default_container_max_output_bytes(),
        }
    }
}

/// Default timezone applied to cron-scheduled tasks that don't specify one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulingConfig {
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_scheduler_poll_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_timezone: default_timezone(),
            poll_interval_secs: default_scheduler_poll_secs(),
        }
    }
}

/// Embeddings provider used by the KB Pipeline (C4). `None` is valid — the
/// pipeline falls back to keyword-only storage, per §9's stated behavior
/// when the provider is unavailable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EmbeddingsConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
}

/// The registry of host-filesystem project paths that may be offered to
/// groups as extra mounts, mirrored to `sugar-projects.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathsConfig {
    /// Directory holding per-group workspaces (`groups/<folder>/`).
    #[serde(default = "default_groups_dir")]
    pub groups_dir: String,
    /// Directory holding `data/` (registry JSON, IPC, snapshots).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_port")]
    pub port: u16,
    #[serde(default = "default_health_bind")]
    pub bind: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            port: default_health_port(),
            bind: default_health_bind(),
        }
    }
}

/// Poll cadences for the Intake Loop (C3), IPC Broker (C6), and the
/// Scheduler's own tick interval (duplicated in `SchedulingConfig` since it
/// governs a different subsystem than generic polling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_intake_poll_ms")]
    pub intake_interval_ms: u64,
    #[serde(default = "default_ipc_poll_ms")]
    pub ipc_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            intake_interval_ms: default_intake_poll_ms(),
            ipc_interval_ms: default_ipc_poll_ms(),
        }
    }
}

fn default_assistant_name() -> String {
    "Huddle".to_string()
}
fn default_image_tag() -> String {
    "huddle-agent:latest".to_string()
}
fn default_container_timeout_secs() -> u64 {
    DEFAULT_CONTAINER_TIMEOUT_SECS
}
fn default_container_memory_mb() -> u64 {
    DEFAULT_CONTAINER_MEMORY_MB
}
fn default_container_max_output_bytes() -> usize {
    DEFAULT_CONTAINER_MAX_OUTPUT_BYTES
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_scheduler_poll_secs() -> u64 {
    DEFAULT_SCHEDULER_POLL_SECS
}
fn default_embeddings_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_groups_dir() -> String {
    "groups".to_string()
}
fn default_data_dir() -> String {
    "data".to_string()
}
fn default_health_port() -> u16 {
    DEFAULT_HEALTH_PORT
}
fn default_health_bind() -> String {
    DEFAULT_HEALTH_BIND.to_string()
}
fn default_intake_poll_ms() -> u64 {
    DEFAULT_INTAKE_POLL_MS
}
fn default_ipc_poll_ms() -> u64 {
    DEFAULT_IPC_POLL_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.huddle/huddle.db")
}
fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.huddle/huddle.toml")
}

impl HuddleConfig {
    /// Load config from a TOML file with `HUDDLE_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `~/.huddle/huddle.toml`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: HuddleConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("HUDDLE_").split("_"))
            .extract()
            .map_err(|e| crate::error::HuddleError::Config(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = HuddleConfig::default();
        assert_eq!(cfg.container.timeout_secs, DEFAULT_CONTAINER_TIMEOUT_SECS);
        assert_eq!(cfg.scheduling.default_timezone, "UTC");
        assert!(cfg.embeddings.endpoint.is_none());
    }
}
