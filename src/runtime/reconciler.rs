//! Background reconciliation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::SchedulingCoordinator;
use crate::infra::store::EntryStore;
use crate::infra::surface::PostingSurface;

/// Periodically runs [`SchedulingCoordinator::reconcile`] and
/// [`SchedulingCoordinator::purge_expired`] on the current tokio runtime.
pub struct ReconcileWorker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReconcileWorker {
    /// Start a worker ticking every `interval`. The first cycle runs
    /// immediately.
    pub fn spawn<P, E>(coordinator: Arc<SchedulingCoordinator<P, E>>, interval: Duration) -> Self
    where
        P: PostingSurface + 'static,
        E: EntryStore + 'static,
    {
        let (shutdown, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => run_cycle(&coordinator).await,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("reconcile worker stopped");
        });
        Self { shutdown, handle }
    }

    /// Whether the worker task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the worker and wait for the current cycle to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "reconcile worker panicked");
        }
    }
}

async fn run_cycle<P, E>(coordinator: &SchedulingCoordinator<P, E>)
where
    P: PostingSurface,
    E: EntryStore,
{
    match coordinator.reconcile().await {
        Ok(report) if !report.is_noop() => {
            tracing::info!(
                published = report.published.len(),
                withdrawn = report.withdrawn.len(),
                adopted = report.adopted.len(),
                "reconcile cycle applied changes"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, retryable = e.is_retryable(), "reconcile cycle failed"),
    }
    if let Err(e) = coordinator.purge_expired().await {
        tracing::warn!(error = %e, "retention purge failed");
    }
}
