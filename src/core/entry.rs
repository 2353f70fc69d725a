//! Content entries and their lifecycle.
//!
//! ```text
//!            approve                 reconcile
//!   pending ─────────▶ scheduled ─────────────▶ published ──▶ ∅ (retention)
//!     ▲ │  ◀─────────
//!     │ │  unschedule
//!     │ ▼ deny
//!    denied ──────────────────────────────────────────────▶ ∅ (retention)
//!       restore ▲
//! ```
//!
//! Any change that touches `post_number` or `scheduled_time` is made by the
//! coordinator while it holds the scheduling lock.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{ScheduleResult, SchedulingError};

/// Opaque entry identifier assigned at ingestion.
pub type EntryId = Uuid;

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Awaiting review.
    Pending,
    /// Approved and placed on the posting surface.
    Scheduled,
    /// Rejected by a reviewer.
    Denied,
    /// The scheduled post has fired.
    Published,
}

impl EntryStatus {
    /// String form used by stores.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scheduled => "scheduled",
            Self::Denied => "denied",
            Self::Published => "published",
        }
    }

    /// Whether entries in this state carry a number and a slot.
    pub const fn is_numbered(self) -> bool {
        matches!(self, Self::Scheduled | Self::Published)
    }

    /// Whether `self -> next` is an allowed transition.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Scheduled | Self::Denied)
                | (Self::Scheduled, Self::Pending | Self::Published)
                | (Self::Denied, Self::Pending)
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "scheduled" => Ok(Self::Scheduled),
            "denied" => Ok(Self::Denied),
            "published" => Ok(Self::Published),
            other => Err(format!("unknown entry status `{other}`")),
        }
    }
}

/// One content item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Immutable identifier.
    pub id: EntryId,
    /// Post body without the number prefix.
    pub text: String,
    /// Lifecycle state.
    pub status: EntryStatus,
    /// Sequence number; present iff scheduled or published.
    pub post_number: Option<u64>,
    /// Publication slot; present iff scheduled or published.
    pub scheduled_time: Option<DateTime<Utc>>,
    /// Posting surface identifier; present while scheduled.
    pub post_id: Option<String>,
    /// Ingestion time.
    pub created_at: DateTime<Utc>,
    /// Time of the last denial.
    pub denied_at: Option<DateTime<Utc>>,
}

impl Entry {
    /// New pending entry.
    pub fn new(text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            status: EntryStatus::Pending,
            post_number: None,
            scheduled_time: None,
            post_id: None,
            created_at,
            denied_at: None,
        }
    }

    fn transition(&mut self, next: EntryStatus) -> ScheduleResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulingError::InvalidTransition {
                entry: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> scheduled`, recording number, slot and post id.
    pub fn schedule(
        &mut self,
        number: u64,
        at: DateTime<Utc>,
        post_id: impl Into<String>,
    ) -> ScheduleResult<()> {
        self.transition(EntryStatus::Scheduled)?;
        self.post_number = Some(number);
        self.scheduled_time = Some(at);
        self.post_id = Some(post_id.into());
        Ok(())
    }

    /// `scheduled -> pending`, clearing number, slot and post id.
    pub fn unschedule(&mut self) -> ScheduleResult<()> {
        self.transition(EntryStatus::Pending)?;
        self.post_number = None;
        self.scheduled_time = None;
        self.post_id = None;
        Ok(())
    }

    /// `pending -> denied`.
    pub fn deny(&mut self, at: DateTime<Utc>) -> ScheduleResult<()> {
        self.transition(EntryStatus::Denied)?;
        self.denied_at = Some(at);
        Ok(())
    }

    /// `denied -> pending`.
    pub fn restore(&mut self) -> ScheduleResult<()> {
        self.transition(EntryStatus::Pending)?;
        self.denied_at = None;
        Ok(())
    }

    /// `scheduled -> published`. Number and slot are kept; the post id is not,
    /// since the surface no longer lists the post as scheduled.
    pub fn publish(&mut self) -> ScheduleResult<()> {
        self.transition(EntryStatus::Published)?;
        self.post_id = None;
        Ok(())
    }

    /// Fail with `InvalidTransition` unless the entry is in `expected`.
    pub fn require(&self, expected: EntryStatus, wanted: EntryStatus) -> ScheduleResult<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(SchedulingError::InvalidTransition {
                entry: self.id,
                from: self.status,
                to: wanted,
            })
        }
    }
}
