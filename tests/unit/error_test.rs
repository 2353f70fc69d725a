//! Tests for error types

use post_scheduler::core::{FailureOutcome, SchedulingError};
use post_scheduler::infra::{StoreError, SurfaceError};
use uuid::Uuid;

#[test]
fn test_slot_unavailable_error() {
    let err = SchedulingError::SlotUnavailable { searched_days: 365 };
    assert_eq!(format!("{}", err), "no slot available within 365 days");
    assert_eq!(err.outcome(), FailureOutcome::NothingHappened);
    assert!(!err.is_retryable());
}

#[test]
fn test_slot_contended_is_retryable() {
    let err = SchedulingError::SlotContended { attempts: 3 };
    assert!(err.is_retryable());
    assert_eq!(err.outcome(), FailureOutcome::NothingHappened);
}

#[test]
fn test_external_read_error() {
    let err = SchedulingError::ExternalReadFailed(SurfaceError::Transient("timeout".into()));
    assert_eq!(
        format!("{}", err),
        "posting surface read failed: transient surface failure: timeout"
    );
    assert!(err.is_retryable());
}

#[test]
fn test_partial_commit_needs_repair() {
    let err = SchedulingError::PartialCommit {
        entry: Uuid::new_v4(),
        post_id: "post-1".into(),
        reason: "disk full".into(),
    };
    assert_eq!(err.outcome(), FailureOutcome::PartialState);
    assert!(!err.is_retryable());
}

#[test]
fn test_store_error_is_transparent() {
    let id = Uuid::new_v4();
    let err = SchedulingError::from(StoreError::Missing(id));
    assert_eq!(format!("{}", err), format!("entry {id} does not exist"));
}

#[test]
fn test_outcome_serializes_snake_case() {
    let json = serde_json::to_string(&FailureOutcome::PartialState).unwrap();
    assert_eq!(json, "\"partial_state\"");
}
