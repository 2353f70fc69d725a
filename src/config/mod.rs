//! Configuration models for windows, exclusions, retries and timeouts.

pub mod schedule;
pub mod source;

pub use schedule::{ConfigError, ExclusionConfig, ScheduleConfig};
pub use source::{ConfigSource, JsonFileConfig, StaticConfig, CONFIG_PATH_ENV};
