//! Tests for configuration validation

use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use post_scheduler::config::{ConfigError, ConfigSource, ScheduleConfig, StaticConfig};

#[test]
fn test_schedule_config_from_json() {
    let cfg = ScheduleConfig::from_json_str(
        r#"{
            "posting_windows": ["08:30", "17:45"],
            "timezone": "Europe/Berlin",
            "exclusions": {
                "skip_weekdays": ["sat", "sun"],
                "excluded_dates": ["2026-12-24"]
            },
            "retention_hours": 48,
            "retry": { "max_retries": 5, "base_delay_ms": 100 },
            "lock_timeout_ms": 2500
        }"#,
    )
    .unwrap();

    assert_eq!(cfg.parse_timezone().unwrap(), chrono_tz::Europe::Berlin);
    assert_eq!(
        cfg.exclusions.weekdays().unwrap(),
        vec![Weekday::Sat, Weekday::Sun]
    );
    assert_eq!(
        cfg.exclusions.excluded_dates,
        vec![NaiveDate::from_ymd_opt(2026, 12, 24).unwrap()]
    );
    assert!(cfg.exclusions.skip_holidays);
    assert_eq!(cfg.retention(), chrono::Duration::hours(48));
    assert_eq!(cfg.retry.max_retries, 5);
    assert_eq!(cfg.retry.max_delay_ms, 5_000);
    assert_eq!(cfg.lock_timeout(), Some(Duration::from_millis(2500)));
    assert_eq!(cfg.max_search_days, 365);
}

#[test]
fn test_schedule_config_parse_error() {
    assert!(matches!(
        ScheduleConfig::from_json_str("{ not json"),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn test_schedule_config_invalid_verify_retries() {
    let invalid = ScheduleConfig {
        verify_retries: 0,
        ..ScheduleConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_schedule_config_invalid_lock_timeout() {
    let invalid = ScheduleConfig {
        lock_timeout_ms: Some(0),
        ..ScheduleConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_schedule_config_invalid_retention() {
    let invalid = ScheduleConfig {
        retention_hours: u64::MAX,
        ..ScheduleConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_static_config_is_swappable() {
    let source = StaticConfig::default();
    let updated = ScheduleConfig {
        posting_windows: vec!["12:00".into()],
        ..ScheduleConfig::default()
    };
    source.replace(updated).unwrap();
    assert_eq!(source.load().unwrap().windows().unwrap().len(), 1);
}
