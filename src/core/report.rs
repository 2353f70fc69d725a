//! Results returned by coordinator operations.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entry::EntryId;
use crate::core::ledger::SequenceIssue;
use crate::core::slot::Slot;

/// A successful approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    /// Approved entry.
    pub entry_id: EntryId,
    /// Number assigned.
    pub post_number: u64,
    /// Local slot.
    pub slot: Slot,
    /// Publication instant.
    pub scheduled_time: DateTime<Utc>,
    /// Surface identifier of the created post.
    pub post_id: String,
}

/// A successful unschedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnscheduleOutcome {
    /// Entry returned to pending.
    pub entry_id: EntryId,
    /// Number it held.
    pub removed_number: u64,
    /// Entries relabelled by the sweep.
    pub renumbered: usize,
}

/// Direction for [`swap`](crate::core::SchedulingCoordinator::swap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Exchange with the previous scheduled entry.
    Earlier,
    /// Exchange with the next scheduled entry.
    Later,
}

/// What reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Entries whose post has fired.
    pub published: Vec<EntryId>,
    /// Entries whose post vanished before its time; returned to pending.
    pub withdrawn: Vec<EntryId>,
    /// Entries whose local time was aligned with the surface.
    pub realigned: Vec<EntryId>,
    /// Surface posts adopted as scheduled entries.
    pub adopted: Vec<EntryId>,
    /// Surface posts that could not be matched nor adopted.
    pub unmatched_posts: Vec<String>,
    /// Entries relabelled while withdrawing.
    pub renumbered: usize,
}

impl ReconcileReport {
    /// Whether nothing changed.
    pub fn is_noop(&self) -> bool {
        self.published.is_empty()
            && self.withdrawn.is_empty()
            && self.realigned.is_empty()
            && self.adopted.is_empty()
    }
}

/// Result of a numbering check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingReport {
    /// Current ledger value.
    pub next_number: u64,
    /// Scheduled and published entries checked.
    pub checked: usize,
    /// Problems found.
    pub issues: Vec<SequenceIssue>,
}

impl NumberingReport {
    /// Whether numbering is dense and collision-free.
    pub fn is_consistent(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Result of a numbering repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Entries whose number changed.
    pub relabelled: Vec<EntryId>,
    /// Ledger value after the repair.
    pub next_number: u64,
}

/// One line of the schedule summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    /// Entry.
    pub entry_id: EntryId,
    /// Post number.
    pub post_number: Option<u64>,
    /// Local publication time.
    pub time: NaiveTime,
    /// Truncated text.
    pub preview: String,
}

/// Scheduled posts of one local day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Local date.
    pub date: NaiveDate,
    /// Posts in time order.
    pub posts: Vec<SummaryLine>,
}

/// Scheduled posts grouped by day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    /// Days in ascending order.
    pub days: Vec<DaySummary>,
    /// Total scheduled posts.
    pub total: usize,
}
