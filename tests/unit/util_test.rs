//! Tests for utility functions

use chrono::{Duration, TimeZone, Utc};
use post_scheduler::util::clock::{Clock, ManualClock};
use post_scheduler::util::retry::{with_retry_if, RetryPolicy};
use post_scheduler::util::text::{format_post_text, parse_post_number, preview, strip_post_number};

#[test]
fn test_post_number_prefix() {
    assert_eq!(format_post_text(12, "hello"), "#12 hello");
    assert_eq!(parse_post_number("#12 hello"), Some(12));
    assert_eq!(parse_post_number("hello #12"), None);
    assert_eq!(strip_post_number("#12 hello"), "hello");
    assert_eq!(strip_post_number("#tag hello"), "#tag hello");
}

#[test]
fn test_preview_is_char_safe() {
    assert_eq!(preview("short", 50), "short");
    assert_eq!(preview("ééééé", 3), "ééé...");
}

#[test]
fn test_manual_clock() {
    let start = Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    clock.advance(Duration::minutes(90));
    assert_eq!(clock.now(), start + Duration::minutes(90));
}

#[test]
fn test_retry_delays_are_capped() {
    let policy = RetryPolicy::with_delays(5, 100, 300);
    assert_eq!(policy.delay_for(0), std::time::Duration::ZERO);
    assert_eq!(policy.delay_for(1), std::time::Duration::from_millis(100));
    assert_eq!(policy.delay_for(2), std::time::Duration::from_millis(200));
    assert_eq!(policy.delay_for(3), std::time::Duration::from_millis(300));
}

#[tokio::test]
async fn test_retry_stops_on_non_retryable() {
    let policy = RetryPolicy::with_delays(3, 1, 1);
    let mut attempts = 0;

    let result: Result<(), &str> = with_retry_if(
        &policy,
        || {
            attempts += 1;
            async { Err("fatal") }
        },
        |e: &&str| *e != "fatal",
    )
    .await;

    assert_eq!(result, Err("fatal"));
    assert_eq!(attempts, 1);
}

#[tokio::test]
async fn test_retry_until_success() {
    let policy = RetryPolicy::with_delays(3, 1, 1);
    let mut attempts = 0;

    let result: Result<u32, &str> = with_retry_if(
        &policy,
        || {
            attempts += 1;
            let n = attempts;
            async move {
                if n < 3 {
                    Err("busy")
                } else {
                    Ok(n)
                }
            }
        },
        |_: &&str| true,
    )
    .await;

    assert_eq!(result, Ok(3));
}
