//! Scheduling configuration structures.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::calendar::{
    CompositeCalendar, DateListExclusion, ExclusionCalendar, WeekdayExclusion,
};
use crate::util::retry::RetryPolicy;

const MAX_RETENTION_HOURS: u64 = 24 * 365 * 100;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The document could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A value is out of range or malformed.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// A required environment variable is not set.
    #[error("missing environment variable {0}")]
    MissingEnv(String),
    /// The config file could not be read.
    #[error("cannot read config {path}: {reason}")]
    Io {
        /// File that was read.
        path: String,
        /// Underlying I/O error.
        reason: String,
    },
}

/// Which dates never receive posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExclusionConfig {
    /// Weekdays to skip, e.g. `["sat"]`.
    pub skip_weekdays: Vec<String>,
    /// Consult the injected holiday calendar.
    pub skip_holidays: bool,
    /// Additional fixed dates to skip.
    pub excluded_dates: Vec<NaiveDate>,
}

impl Default for ExclusionConfig {
    fn default() -> Self {
        Self {
            skip_weekdays: Vec::new(),
            skip_holidays: true,
            excluded_dates: Vec::new(),
        }
    }
}

impl ExclusionConfig {
    /// Parsed weekday names.
    pub fn weekdays(&self) -> Result<Vec<Weekday>, ConfigError> {
        self.skip_weekdays
            .iter()
            .map(|name| {
                name.parse::<Weekday>()
                    .map_err(|_| ConfigError::Invalid(format!("unknown weekday `{name}`")))
            })
            .collect()
    }
}

/// Root scheduling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Local publication times, `HH:MM`.
    pub posting_windows: Vec<String>,
    /// IANA time zone the windows are expressed in.
    pub timezone: String,
    /// Excluded dates.
    pub exclusions: ExclusionConfig,
    /// Hours denied and published entries are kept.
    pub retention_hours: u64,
    /// Days the allocator searches before giving up.
    pub max_search_days: u32,
    /// Times a candidate slot is re-verified against the surface.
    pub verify_retries: u32,
    /// Retry policy for transient surface failures.
    pub retry: RetryPolicy,
    /// Bound on waiting for the scheduling lock; unbounded when absent.
    pub lock_timeout_ms: Option<u64>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            posting_windows: vec!["09:00".into(), "14:00".into(), "19:00".into()],
            timezone: "UTC".into(),
            exclusions: ExclusionConfig::default(),
            retention_hours: 24,
            max_search_days: 365,
            verify_retries: 3,
            retry: RetryPolicy::default(),
            lock_timeout_ms: None,
        }
    }
}

impl ScheduleConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.windows()?.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one posting window must be defined".into(),
            ));
        }
        self.parse_timezone()?;
        self.exclusions.weekdays()?;
        if self.max_search_days == 0 {
            return Err(ConfigError::Invalid(
                "max_search_days must be greater than 0".into(),
            ));
        }
        if self.retention_hours > MAX_RETENTION_HOURS {
            return Err(ConfigError::Invalid(format!(
                "retention_hours must be at most {MAX_RETENTION_HOURS}"
            )));
        }
        if self.verify_retries == 0 {
            return Err(ConfigError::Invalid(
                "verify_retries must be greater than 0".into(),
            ));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.backoff_multiplier must be at least 1.0".into(),
            ));
        }
        if self.lock_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "lock_timeout_ms must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let cfg: Self =
            serde_json::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Posting windows, parsed, sorted and deduplicated.
    pub fn windows(&self) -> Result<Vec<NaiveTime>, ConfigError> {
        let mut windows = self
            .posting_windows
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw.trim(), "%H:%M")
                    .map_err(|e| ConfigError::Invalid(format!("posting window `{raw}`: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        windows.sort_unstable();
        windows.dedup();
        Ok(windows)
    }

    /// Configured time zone.
    pub fn parse_timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone `{}`", self.timezone)))
    }

    /// Lock acquisition bound.
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }

    /// Retention window for denied and published entries.
    pub fn retention(&self) -> chrono::Duration {
        let hours = i64::try_from(self.retention_hours.min(MAX_RETENTION_HOURS)).unwrap_or_default();
        chrono::Duration::hours(hours)
    }

    /// Build the effective exclusion calendar. `holidays` is consulted only
    /// when `skip_holidays` is set.
    pub fn calendar(
        &self,
        holidays: &Arc<dyn ExclusionCalendar>,
    ) -> Result<CompositeCalendar, ConfigError> {
        let mut calendar = CompositeCalendar::new();
        let weekdays = self.exclusions.weekdays()?;
        if !weekdays.is_empty() {
            calendar = calendar.with(Arc::new(WeekdayExclusion::new(weekdays)));
        }
        if !self.exclusions.excluded_dates.is_empty() {
            calendar = calendar.with(Arc::new(DateListExclusion::new(
                self.exclusions.excluded_dates.iter().copied(),
            )));
        }
        if self.exclusions.skip_holidays {
            calendar = calendar.with(Arc::clone(holidays));
        }
        Ok(calendar)
    }
}
