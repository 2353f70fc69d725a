//! Tests for audit sink

use chrono::{TimeZone, Utc};
use post_scheduler::core::{build_audit_event, AuditAction, AuditSink, InMemoryAuditSink};
use uuid::Uuid;

#[test]
fn test_in_memory_audit_sink() {
    let sink = InMemoryAuditSink::new(10);
    let entry = Uuid::new_v4();

    sink.record(build_audit_event(
        Some(entry),
        AuditAction::Approve,
        Some(1),
        None,
        None,
    ));
    sink.record(build_audit_event(
        Some(entry),
        AuditAction::Unschedule,
        Some(1),
        None,
        Some("withdrawn".to_string()),
    ));

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].entry_id, Some(entry));
    assert_eq!(events[0].action, AuditAction::Approve);
    assert_eq!(sink.events_for(AuditAction::Unschedule).len(), 1);
}

#[test]
fn test_audit_sink_overflow() {
    let sink = InMemoryAuditSink::new(2);

    for number in 1..=3 {
        sink.record(build_audit_event(
            None,
            AuditAction::Renumber,
            Some(number),
            None,
            None,
        ));
    }

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].post_number, Some(2)); // First one popped
    assert_eq!(events[1].post_number, Some(3));
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let sink = InMemoryAuditSink::new(0);
    sink.record(build_audit_event(None, AuditAction::LedgerReset, Some(5), None, None));
    assert!(sink.events().is_empty());
}

#[test]
fn test_build_audit_event() {
    let at = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
    let event = build_audit_event(
        None,
        AuditAction::Repair,
        Some(3),
        Some(at),
        Some("#4 -> #3".to_string()),
    );

    assert!(Uuid::parse_str(&event.event_id).is_ok());
    assert_eq!(event.scheduled_time, Some(at));
    assert_eq!(event.detail.as_deref(), Some("#4 -> #3"));
    assert!(event.created_at_ms > 0);

    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["action"], "repair");
}
