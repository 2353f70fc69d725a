//! Where the coordinator reads its configuration from.
//!
//! Configuration is loaded at the start of every transaction, so a change to
//! the backing source takes effect on the next approve without a restart.

use std::path::PathBuf;

use parking_lot::RwLock;

use super::schedule::{ConfigError, ScheduleConfig};

/// Environment variable naming the JSON config file.
pub const CONFIG_PATH_ENV: &str = "POST_SCHEDULER_CONFIG";

/// Provider of the current configuration.
pub trait ConfigSource: Send + Sync {
    /// Load and validate the current configuration.
    fn load(&self) -> Result<ScheduleConfig, ConfigError>;
}

/// Configuration held in memory; can be swapped at runtime.
#[derive(Debug, Default)]
pub struct StaticConfig {
    inner: RwLock<ScheduleConfig>,
}

impl StaticConfig {
    /// Wrap `config`.
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Replace the configuration after validating it.
    pub fn replace(&self, config: ScheduleConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.inner.write() = config;
        Ok(())
    }
}

impl ConfigSource for StaticConfig {
    fn load(&self) -> Result<ScheduleConfig, ConfigError> {
        let cfg = self.inner.read().clone();
        cfg.validate()?;
        Ok(cfg)
    }
}

/// JSON file re-read on every load.
#[derive(Debug, Clone)]
pub struct JsonFileConfig {
    path: PathBuf,
}

impl JsonFileConfig {
    /// Source backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Source at the path named by `POST_SCHEDULER_CONFIG`, reading `.env`
    /// first.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        std::env::var(CONFIG_PATH_ENV)
            .map(Self::new)
            .map_err(|_| ConfigError::MissingEnv(CONFIG_PATH_ENV.to_string()))
    }
}

impl ConfigSource for JsonFileConfig {
    fn load(&self) -> Result<ScheduleConfig, ConfigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        ScheduleConfig::from_json_str(&raw)
    }
}
