//! Integration tests for reconciliation against the posting surface and for
//! numbering maintenance.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use post_scheduler::builders::CoordinatorBuilder;
use post_scheduler::config::ScheduleConfig;
use post_scheduler::core::{
    AuditAction, Entry, EntryStatus, InMemoryAuditSink, SchedulingCoordinator, SequenceIssue,
};
use post_scheduler::infra::{
    EntryStore, InMemoryEntryStore, InMemorySurface, PostUpdate, PostingSurface, SqliteEntryStore,
};
use post_scheduler::util::clock::ManualClock;
use post_scheduler::util::retry::RetryPolicy;
use post_scheduler::util::telemetry::init_tracing;

fn d(day_offset: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1 + day_offset, hour, 0, 0)
        .unwrap()
}

fn test_config() -> ScheduleConfig {
    ScheduleConfig {
        retry: RetryPolicy::with_delays(2, 1, 1),
        ..ScheduleConfig::default()
    }
}

struct Harness {
    coordinator: SchedulingCoordinator<Arc<InMemorySurface>, Arc<InMemoryEntryStore>>,
    surface: Arc<InMemorySurface>,
    store: Arc<InMemoryEntryStore>,
    clock: ManualClock,
    audit: Arc<InMemoryAuditSink>,
}

async fn harness() -> Harness {
    init_tracing();
    let surface = Arc::new(InMemorySurface::new());
    let store = Arc::new(InMemoryEntryStore::new());
    let clock = ManualClock::new(d(0, 8));
    let audit = Arc::new(InMemoryAuditSink::new(1_000));
    let coordinator = CoordinatorBuilder::new(Arc::clone(&surface), Arc::clone(&store))
        .with_config(test_config())
        .with_clock(Arc::new(clock.clone()))
        .with_audit(audit.clone())
        .build()
        .await
        .unwrap();
    Harness {
        coordinator,
        surface,
        store,
        clock,
        audit,
    }
}

async fn schedule_many(h: &Harness, count: usize) -> Vec<Entry> {
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let entry = h.coordinator.submit(&format!("post {i}")).await.unwrap();
        h.coordinator.approve(entry.id, None).await.unwrap();
        entries.push(h.coordinator.entry(entry.id).await.unwrap());
    }
    entries
}

#[tokio::test]
async fn test_reconcile_without_changes_is_noop() {
    let h = harness().await;
    schedule_many(&h, 2).await;

    let report = h.coordinator.reconcile().await.unwrap();

    assert!(report.is_noop());
}

#[tokio::test]
async fn test_fired_posts_are_published() {
    let h = harness().await;
    let entries = schedule_many(&h, 2).await;

    h.clock.set(d(0, 10));
    assert_eq!(h.surface.fire_due(d(0, 10)).len(), 1);
    let report = h.coordinator.reconcile().await.unwrap();

    assert_eq!(report.published, vec![entries[0].id]);
    let published = h.coordinator.entry(entries[0].id).await.unwrap();
    assert_eq!(published.status, EntryStatus::Published);
    assert_eq!(published.post_number, Some(1));
    assert_eq!(published.post_id, None);
    assert_eq!(h.audit.events_for(AuditAction::Publish).len(), 1);

    // Published numbers still count toward the sequence.
    let next = h.coordinator.submit("afternoon").await.unwrap();
    let outcome = h.coordinator.approve(next.id, None).await.unwrap();
    assert_eq!(outcome.post_number, 3);
    assert!(h.coordinator.verify_numbering().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_missing_future_post_is_withdrawn() {
    let h = harness().await;
    let entries = schedule_many(&h, 3).await;
    h.surface
        .remove_external(entries[1].post_id.as_deref().unwrap());

    let report = h.coordinator.reconcile().await.unwrap();

    assert_eq!(report.withdrawn, vec![entries[1].id]);
    assert_eq!(report.renumbered, 1);
    assert_eq!(
        h.coordinator.entry(entries[1].id).await.unwrap().status,
        EntryStatus::Pending
    );
    let last = h.coordinator.entry(entries[2].id).await.unwrap();
    assert_eq!(last.post_number, Some(2));
    assert_eq!(last.scheduled_time, Some(d(0, 14)));
    assert_eq!(h.coordinator.next_number().await, 3);
}

#[tokio::test]
async fn test_multiple_orphans_close_up_in_one_pass() {
    let h = harness().await;
    let entries = schedule_many(&h, 5).await;
    h.surface
        .remove_external(entries[1].post_id.as_deref().unwrap());
    h.surface
        .remove_external(entries[3].post_id.as_deref().unwrap());

    let report = h.coordinator.reconcile().await.unwrap();

    assert_eq!(report.withdrawn.len(), 2);
    let numbers: Vec<_> = h
        .coordinator
        .list_scheduled()
        .await
        .unwrap()
        .iter()
        .map(|e| e.post_number)
        .collect();
    assert_eq!(numbers, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(h.coordinator.next_number().await, 4);
    assert!(h.coordinator.verify_numbering().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_moved_post_is_realigned() {
    let h = harness().await;
    let entries = schedule_many(&h, 1).await;
    let post_id = entries[0].post_id.clone().unwrap();
    h.surface
        .update(&post_id, &PostUpdate::moved("#1 post 0", d(2, 19)))
        .await
        .unwrap();

    let report = h.coordinator.reconcile().await.unwrap();

    assert_eq!(report.realigned, vec![entries[0].id]);
    assert_eq!(
        h.coordinator.entry(entries[0].id).await.unwrap().scheduled_time,
        Some(d(2, 19))
    );
}

#[tokio::test]
async fn test_unknown_numbered_post_is_adopted() {
    let h = harness().await;
    h.surface.insert_external("#1 written elsewhere", d(0, 9));
    let stray = h.surface.insert_external("no number here", d(0, 14));

    let report = h.coordinator.reconcile().await.unwrap();

    assert_eq!(report.adopted.len(), 1);
    assert_eq!(report.unmatched_posts, vec![stray]);
    let adopted = h.coordinator.entry(report.adopted[0]).await.unwrap();
    assert_eq!(adopted.text, "written elsewhere");
    assert_eq!(adopted.post_number, Some(1));
    assert_eq!(adopted.status, EntryStatus::Scheduled);
    assert_eq!(h.coordinator.next_number().await, 2);
    assert_eq!(h.store.load_next_number().await.unwrap(), Some(2));

    // Neither post's slot is handed out again.
    let entry = h.coordinator.submit("local").await.unwrap();
    let outcome = h.coordinator.approve(entry.id, None).await.unwrap();
    assert_eq!(outcome.post_number, 2);
    assert_eq!(outcome.scheduled_time, d(0, 19));
}

#[tokio::test]
async fn test_duplicate_number_is_not_adopted() {
    let h = harness().await;
    schedule_many(&h, 1).await;
    let dup = h.surface.insert_external("#1 imposter", d(1, 9));

    let report = h.coordinator.reconcile().await.unwrap();

    assert!(report.adopted.is_empty());
    assert_eq!(report.unmatched_posts, vec![dup]);
}

#[tokio::test]
async fn test_verify_and_repair_numbering() {
    let h = harness().await;
    let entries = schedule_many(&h, 3).await;
    // Simulate drift: the last entry's number changed locally.
    let mut drifted = entries[2].clone();
    drifted.post_number = Some(7);
    h.store.update(&drifted).await.unwrap();

    let report = h.coordinator.verify_numbering().await.unwrap();
    assert!(!report.is_consistent());
    assert_eq!(report.checked, 3);
    assert!(report
        .issues
        .iter()
        .any(|i| matches!(i, SequenceIssue::OutOfSequence { expected: 3, .. })));

    let repair = h.coordinator.repair_numbering().await.unwrap();
    assert_eq!(repair.relabelled, vec![entries[2].id]);
    assert_eq!(repair.next_number, 4);
    let post = h
        .surface
        .post(entries[2].post_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(post.text, "#3 post 2");
    assert_eq!(h.audit.events_for(AuditAction::Repair).len(), 1);

    // Repair is idempotent.
    let again = h.coordinator.repair_numbering().await.unwrap();
    assert!(again.relabelled.is_empty());
    assert!(h.coordinator.verify_numbering().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_published_entries_expire() {
    let h = harness().await;
    let entries = schedule_many(&h, 1).await;
    h.clock.set(d(0, 10));
    h.surface.fire_due(d(0, 10));
    h.coordinator.reconcile().await.unwrap();

    assert_eq!(h.coordinator.purge_expired().await.unwrap(), 0);
    h.clock.set(d(1, 10));
    assert_eq!(h.coordinator.purge_expired().await.unwrap(), 1);
    assert!(h.coordinator.entry(entries[0].id).await.is_err());
}

#[tokio::test]
async fn test_sqlite_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("entries.db");
    let surface = Arc::new(InMemorySurface::new());
    let clock = ManualClock::new(d(0, 8));

    let first_id = {
        let coordinator = CoordinatorBuilder::new(
            Arc::clone(&surface),
            SqliteEntryStore::new(&path).unwrap(),
        )
        .with_config(test_config())
        .with_clock(Arc::new(clock.clone()))
        .build()
        .await
        .unwrap();
        let entry = coordinator.submit("persisted").await.unwrap();
        coordinator.approve(entry.id, None).await.unwrap();
        entry.id
    };

    let coordinator = CoordinatorBuilder::new(
        Arc::clone(&surface),
        SqliteEntryStore::new(&path).unwrap(),
    )
    .with_config(test_config())
    .with_clock(Arc::new(clock))
    .build()
    .await
    .unwrap();

    assert_eq!(coordinator.next_number().await, 2);
    assert_eq!(
        coordinator.entry(first_id).await.unwrap().post_number,
        Some(1)
    );
    let entry = coordinator.submit("after restart").await.unwrap();
    let outcome = coordinator.approve(entry.id, None).await.unwrap();
    assert_eq!(outcome.post_number, 2);
    assert_eq!(outcome.scheduled_time, d(0, 14));
}
