//! Tests for builder modules

use std::sync::Arc;

use post_scheduler::builders::CoordinatorBuilder;
use post_scheduler::config::ScheduleConfig;
use post_scheduler::core::SchedulingError;
use post_scheduler::infra::{EntryStore, InMemoryEntryStore, InMemorySurface};

#[tokio::test]
async fn test_builder_seeds_fresh_ledger() {
    let store = Arc::new(InMemoryEntryStore::new());
    let coordinator = CoordinatorBuilder::new(InMemorySurface::new(), Arc::clone(&store))
        .build()
        .await
        .unwrap();

    assert_eq!(coordinator.next_number().await, 1);
    assert_eq!(store.load_next_number().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_builder_resumes_persisted_counter() {
    let store = InMemoryEntryStore::new();
    store.save_next_number(42).await.unwrap();

    let coordinator = CoordinatorBuilder::new(InMemorySurface::new(), store)
        .build()
        .await
        .unwrap();

    assert_eq!(coordinator.next_number().await, 42);
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = CoordinatorBuilder::new(InMemorySurface::new(), InMemoryEntryStore::new())
        .with_config(ScheduleConfig {
            timezone: "Nowhere/Special".into(),
            ..ScheduleConfig::default()
        })
        .build()
        .await;

    assert!(matches!(result, Err(SchedulingError::Config(_))));
}
