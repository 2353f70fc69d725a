//! Builder for [`SchedulingCoordinator`].

use std::sync::Arc;

use crate::config::{ConfigSource, ScheduleConfig, StaticConfig};
use crate::core::{
    audit_sequence, AuditSink, ScheduleResult, SchedulingCoordinator, SequenceLedger,
    TracingAuditSink,
};
use crate::infra::calendar::{ExclusionCalendar, NoExclusions};
use crate::infra::store::EntryStore;
use crate::infra::surface::PostingSurface;
use crate::util::clock::{Clock, SystemClock};

/// Assembles a coordinator and seeds its ledger from the store.
pub struct CoordinatorBuilder<P, E> {
    surface: P,
    store: E,
    config: Arc<dyn ConfigSource>,
    holidays: Arc<dyn ExclusionCalendar>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl<P, E> CoordinatorBuilder<P, E>
where
    P: PostingSurface,
    E: EntryStore,
{
    /// Start from a surface and a store with default configuration, no
    /// holidays, the system clock and a tracing audit sink.
    pub fn new(surface: P, store: E) -> Self {
        Self {
            surface,
            store,
            config: Arc::new(StaticConfig::default()),
            holidays: Arc::new(NoExclusions),
            clock: Arc::new(SystemClock),
            audit: Arc::new(TracingAuditSink),
        }
    }

    /// Use a fixed configuration.
    #[must_use]
    pub fn with_config(mut self, config: ScheduleConfig) -> Self {
        self.config = Arc::new(StaticConfig::new(config));
        self
    }

    /// Read configuration from `source` at the start of every transaction.
    #[must_use]
    pub fn with_config_source(mut self, source: Arc<dyn ConfigSource>) -> Self {
        self.config = source;
        self
    }

    /// Holiday predicate consulted when `skip_holidays` is set.
    #[must_use]
    pub fn with_holidays(mut self, holidays: Arc<dyn ExclusionCalendar>) -> Self {
        self.holidays = holidays;
        self
    }

    /// Clock used for "now".
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Validate configuration, seed the ledger from the persisted counter
    /// (1 when none was ever saved) and report numbering drift.
    pub async fn build(self) -> ScheduleResult<SchedulingCoordinator<P, E>> {
        self.config.load()?;

        let ledger = match self.store.load_next_number().await? {
            Some(next) => SequenceLedger::new(next),
            None => {
                let ledger = SequenceLedger::default();
                self.store.save_next_number(ledger.peek()).await?;
                ledger
            }
        };

        let numbered = self.store.list_numbered().await?;
        let issues = audit_sequence(&numbered, ledger.peek());
        if issues.is_empty() {
            tracing::info!(next_number = ledger.peek(), entries = numbered.len(), "ledger seeded");
        } else {
            tracing::warn!(
                next_number = ledger.peek(),
                issues = issues.len(),
                "numbering drift detected at startup; run repair_numbering"
            );
        }

        Ok(SchedulingCoordinator::new(
            self.surface,
            self.store,
            self.config,
            self.holidays,
            self.clock,
            self.audit,
            ledger,
        ))
    }
}
