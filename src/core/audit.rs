//! Audit sink implementations.
//!
//! Every change the coordinator makes to numbers or slots is recorded as an
//! [`AuditEvent`]. Sinks are synchronous and must not block: they are called
//! while the scheduling lock is held.

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::entry::EntryId;
use crate::util::clock::now_ms;

/// What happened to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Entry approved and scheduled.
    Approve,
    /// A reservation was returned after a failed publish.
    Rollback,
    /// Scheduled entry returned to pending.
    Unschedule,
    /// Entry relabelled by a renumbering sweep.
    Renumber,
    /// Renumbering stopped midway.
    RenumberFailed,
    /// Two entries exchanged number and slot.
    Swap,
    /// Text of a scheduled entry changed on the surface.
    Edit,
    /// Entry marked published by reconciliation.
    Publish,
    /// Post found on the surface and adopted.
    Adopt,
    /// Entry relabelled by a numbering repair.
    Repair,
    /// Ledger overwritten by an operator.
    LedgerReset,
}

impl AuditAction {
    /// String form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Rollback => "rollback",
            Self::Unschedule => "unschedule",
            Self::Renumber => "renumber",
            Self::RenumberFailed => "renumber_failed",
            Self::Swap => "swap",
            Self::Edit => "edit",
            Self::Publish => "publish",
            Self::Adopt => "adopt",
            Self::Repair => "repair",
            Self::LedgerReset => "ledger_reset",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related entry, if any.
    pub entry_id: Option<EntryId>,
    /// Action taken.
    pub action: AuditAction,
    /// Post number after the action.
    pub post_number: Option<u64>,
    /// Publication time after the action.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
    /// Additional context.
    pub detail: Option<String>,
}

/// Audit sink abstraction.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: AuditEvent);
}

/// In-memory audit sink for testing and dev.
pub struct InMemoryAuditSink {
    events: Mutex<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl InMemoryAuditSink {
    /// Create a new in-memory sink with a bounded buffer.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(max_events)),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Stored events with `action`.
    pub fn events_for(&self, action: AuditAction) -> Vec<AuditEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        if self.max_events == 0 {
            return;
        }
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sink that writes events to the `post_scheduler::audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "post_scheduler::audit",
            event_id = %event.event_id,
            entry_id = ?event.entry_id,
            action = %event.action,
            post_number = ?event.post_number,
            scheduled_time = ?event.scheduled_time,
            detail = event.detail.as_deref().unwrap_or_default(),
            "audit"
        );
    }
}

/// Helper to build an audit event from context.
pub fn build_audit_event(
    entry_id: Option<EntryId>,
    action: AuditAction,
    post_number: Option<u64>,
    scheduled_time: Option<DateTime<Utc>>,
    detail: Option<String>,
) -> AuditEvent {
    AuditEvent {
        event_id: Uuid::new_v4().to_string(),
        entry_id,
        action,
        post_number,
        scheduled_time,
        created_at_ms: now_ms(),
        detail,
    }
}
