//! Tests for the API adapters and the reconcile worker

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use post_scheduler::builders::CoordinatorBuilder;
use post_scheduler::config::ScheduleConfig;
use post_scheduler::core::{EntryStatus, FailureOutcome, SchedulingCoordinator, SwapDirection};
use post_scheduler::infra::{InMemoryEntryStore, InMemorySurface};
use post_scheduler::runtime::{
    approve_entry, edit_entry, submit_entry, swap_entry, unschedule_entry, ApproveRequest,
    EditRequest, ErrorResponse, ReconcileWorker, SubmitRequest, SwapRequest,
};
use post_scheduler::util::clock::{Clock, ManualClock};
use post_scheduler::util::retry::RetryPolicy;

type Coordinator = SchedulingCoordinator<Arc<InMemorySurface>, InMemoryEntryStore>;

async fn coordinator(surface: Arc<InMemorySurface>, clock: ManualClock) -> Coordinator {
    CoordinatorBuilder::new(surface, InMemoryEntryStore::new())
        .with_config(ScheduleConfig {
            retry: RetryPolicy::with_delays(1, 1, 1),
            ..ScheduleConfig::default()
        })
        .with_clock(Arc::new(clock))
        .build()
        .await
        .unwrap()
}

fn start_clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 8, 0, 0).unwrap())
}

#[tokio::test]
async fn test_api_round_trip() {
    let c = coordinator(Arc::new(InMemorySurface::new()), start_clock()).await;

    let first = submit_entry(&c, SubmitRequest { text: "one".into() }).await.unwrap();
    let second = submit_entry(&c, SubmitRequest { text: "two".into() }).await.unwrap();
    for id in [first.id, second.id] {
        approve_entry(
            &c,
            ApproveRequest {
                entry_id: id,
                edited_text: None,
            },
        )
        .await
        .unwrap();
    }

    let edited = edit_entry(
        &c,
        EditRequest {
            entry_id: first.id,
            text: "one, revised".into(),
        },
    )
    .await
    .unwrap();
    assert_eq!(edited.text, "one, revised");

    let (moved, _) = swap_entry(
        &c,
        SwapRequest {
            entry_id: first.id,
            direction: SwapDirection::Later,
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.post_number, Some(2));

    let outcome = unschedule_entry(&c, second.id).await.unwrap();
    assert_eq!(outcome.removed_number, 1);
    assert_eq!(outcome.renumbered, 1);
}

#[tokio::test]
async fn test_api_error_response() {
    let c = coordinator(Arc::new(InMemorySurface::new()), start_clock()).await;
    let entry = submit_entry(&c, SubmitRequest { text: "no".into() }).await.unwrap();
    c.deny(entry.id).await.unwrap();

    let err: ErrorResponse = approve_entry(
        &c,
        ApproveRequest {
            entry_id: entry.id,
            edited_text: None,
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.outcome, FailureOutcome::NothingHappened);
    assert!(!err.retryable);
    assert!(err.message.contains("denied"));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["outcome"], "nothing_happened");
}

#[test]
fn test_approve_request_defaults() {
    let req: ApproveRequest = serde_json::from_str(
        r#"{"entry_id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}"#,
    )
    .unwrap();
    assert!(req.edited_text.is_none());

    let swap: SwapRequest = serde_json::from_str(
        r#"{"entry_id": "67e55044-10b1-426f-9247-bb680e5fe0c8", "direction": "earlier"}"#,
    )
    .unwrap();
    assert_eq!(swap.direction, SwapDirection::Earlier);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconcile_worker_publishes_fired_posts() {
    let surface = Arc::new(InMemorySurface::new());
    let clock = start_clock();
    let c = Arc::new(coordinator(Arc::clone(&surface), clock.clone()).await);
    let entry = c.submit("soon").await.unwrap();
    c.approve(entry.id, None).await.unwrap();

    clock.set(Utc.with_ymd_and_hms(2026, 6, 1, 9, 30, 0).unwrap());
    surface.fire_due(clock.now());

    let worker = ReconcileWorker::spawn(Arc::clone(&c), Duration::from_millis(10));
    let mut published = false;
    for _ in 0..50 {
        if c.entry(entry.id).await.unwrap().status == EntryStatus::Published {
            published = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(published);
    assert!(!worker.is_finished());

    worker.shutdown().await;
}
