//! Core scheduling abstractions: entries, slots, the ledger and the
//! transaction coordinator.

pub mod audit;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod ledger;
pub mod occupancy;
pub mod report;
pub mod slot;

pub use audit::{
    build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink,
};
pub use coordinator::SchedulingCoordinator;
pub use entry::{Entry, EntryId, EntryStatus};
pub use error::{AppResult, FailureOutcome, ScheduleResult, SchedulingError};
pub use ledger::{audit_sequence, SequenceIssue, SequenceLedger};
pub use occupancy::OccupancyCache;
pub use report::{
    ApprovalOutcome, DaySummary, NumberingReport, ReconcileReport, RepairReport, ScheduleSummary,
    SummaryLine, SwapDirection, UnscheduleOutcome,
};
pub use slot::{find_next_slot, Allocation, Slot, SlotQuery};
