use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::error::{RidedeskError, RidedeskResult};
use crate::roster::{default_roster, AgentSeed};

const SNAPSHOT_FILE_NAME: &str = "support-chat.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RidedeskConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub assignment: AssignmentConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    /// Agents in assignment order. Empty means the built-in roster.
    #[serde(default)]
    pub roster: Vec<AgentSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    #[serde(default = "default_true")]
    pub pretty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentConfig {
    #[serde(default)]
    pub sweep_on_close: bool,

    #[serde(default)]
    pub sweep_on_load: bool,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_ms: u64,
}

fn default_snapshot_path() -> PathBuf {
    get_data_dir()
        .map(|d| d.join(SNAPSHOT_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(SNAPSHOT_FILE_NAME))
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_event_capacity() -> usize {
    256
}

fn default_poll_interval() -> u64 {
    2000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            pretty: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
        }
    }
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            sweep_on_close: false,
            sweep_on_load: false,
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval(),
        }
    }
}

impl RidedeskConfig {
    pub fn load() -> RidedeskResult<Self> {
        Self::load_from_paths(get_config_paths())
    }

    /// Files first (later paths win), then `RIDEDESK__SECTION__KEY` variables,
    /// then the single-variable overrides.
    pub fn load_from_paths(paths: Vec<PathBuf>) -> RidedeskResult<Self> {
        load_dotenv_files();

        let mut builder = ConfigBuilder::builder();

        for path in paths {
            if path.exists() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("RIDEDESK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let mut ridedesk_config: RidedeskConfig = builder.build()?.try_deserialize()?;

        if let Ok(path) = std::env::var("RIDEDESK_SNAPSHOT_PATH") {
            ridedesk_config.storage.snapshot_path = PathBuf::from(path);
        }

        if let Ok(level) = std::env::var("RIDEDESK_LOG_LEVEL") {
            ridedesk_config.logging.level = level;
        }

        if let Ok(interval) = std::env::var("RIDEDESK_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                ridedesk_config.polling.interval_ms = ms;
            }
        }

        ridedesk_config.validate()?;

        Ok(ridedesk_config)
    }

    pub fn validate(&self) -> RidedeskResult<()> {
        if self.storage.snapshot_path.as_os_str().is_empty() {
            return Err(RidedeskError::MissingConfig(
                "storage.snapshot_path".to_string(),
            ));
        }

        if self.polling.interval_ms == 0 {
            return Err(RidedeskError::InvalidConfigValue {
                key: "polling.interval_ms".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.assignment.event_capacity == 0 {
            return Err(RidedeskError::InvalidConfigValue {
                key: "assignment.event_capacity".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !valid_levels.contains(&level_lower.as_str()) && !level_lower.contains('=') {
            return Err(RidedeskError::InvalidConfigValue {
                key: "logging.level".to_string(),
                message: format!(
                    "Invalid log level '{}'. Must be one of: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        let mut seen = HashSet::new();
        for seed in &self.roster {
            if !seen.insert(seed.id.as_str()) {
                return Err(RidedeskError::DuplicateAgent(seed.id.clone()));
            }
            if seed.max_chats == 0 {
                return Err(RidedeskError::InvalidConfigValue {
                    key: format!("roster.{}.max_chats", seed.id),
                    message: "Must be greater than 0".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn snapshot_path(&self) -> &std::path::Path {
        &self.storage.snapshot_path
    }

    pub fn log_level(&self) -> &str {
        &self.logging.level
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.polling.interval_ms)
    }

    /// The configured roster, or the built-in one when none is configured.
    pub fn roster_seeds(&self) -> Vec<AgentSeed> {
        if self.roster.is_empty() {
            default_roster()
        } else {
            self.roster.clone()
        }
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("config").join("default.toml"));
        paths.push(cwd.join("config").join("local.toml"));
        paths.push(cwd.join("ridedesk.toml"));
    }

    if let Some(config_dir) = get_config_dir() {
        paths.push(config_dir.join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".ridedesk").join("config.toml"));
    }

    paths
}

fn load_dotenv_files() {
    let mut env_paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        env_paths.push(cwd.join(".env"));
        env_paths.push(cwd.join(".env.local"));
    }

    if let Some(home) = dirs::home_dir() {
        env_paths.push(home.join(".ridedesk").join(".env"));
    }

    for path in env_paths {
        if path.exists() {
            let _ = dotenvy::from_path(&path);
        }
    }
}

pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ridedesk"))
}

pub fn get_data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("ridedesk"))
}
