//! Publication slots and the slot allocator.
//!
//! A slot is a `(local date, window)` pair in the configured time zone. The
//! allocator is a pure function of its inputs: it never reads the clock or the
//! posting surface itself, which keeps it deterministic and cheap to test.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::core::error::{ScheduleResult, SchedulingError};
use crate::infra::calendar::ExclusionCalendar;

/// A publication slot in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot {
    /// Local calendar date.
    pub date: NaiveDate,
    /// Local time of day.
    pub time: NaiveTime,
}

impl Slot {
    /// Slot at `date` and `time`.
    pub const fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// The slot an instant falls on in `tz`.
    pub fn from_utc(at: DateTime<Utc>, tz: &Tz) -> Self {
        let local = at.with_timezone(tz).naive_local();
        Self::new(local.date(), local.time())
    }

    /// Local date and time.
    pub fn local(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.time)
    }

    /// The instant this slot denotes in `tz`. Ambiguous local times resolve to
    /// the earlier instant; nonexistent ones (DST gap) to `None`.
    pub fn resolve(&self, tz: &Tz) -> Option<DateTime<Utc>> {
        tz.from_local_datetime(&self.local())
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time.format("%H:%M"))
    }
}

/// A chosen slot together with the instant it publishes at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    /// Local slot.
    pub slot: Slot,
    /// Publication instant.
    pub at: DateTime<Utc>,
}

/// Inputs to [`find_next_slot`].
pub struct SlotQuery<'a> {
    /// Reference instant; only slots strictly after it qualify.
    pub now: DateTime<Utc>,
    /// Posting windows in local time.
    pub windows: &'a [NaiveTime],
    /// Slots already taken.
    pub occupied: &'a BTreeSet<Slot>,
    /// Dates that never receive posts.
    pub calendar: &'a dyn ExclusionCalendar,
    /// Number of days searched, starting with today.
    pub max_days: u32,
    /// Zone the windows are expressed in.
    pub tz: Tz,
}

impl fmt::Debug for SlotQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotQuery")
            .field("now", &self.now)
            .field("windows", &self.windows)
            .field("occupied", &self.occupied.len())
            .field("max_days", &self.max_days)
            .field("tz", &self.tz)
            .finish_non_exhaustive()
    }
}

/// Earliest free slot strictly after `now` on a non-excluded date.
///
/// Days are visited in order starting with `now`'s local date, windows in
/// ascending order within a day. A window that does not exist on a date
/// (spring-forward gap) is skipped. Fails with
/// [`SchedulingError::SlotUnavailable`] once `max_days` days are exhausted.
pub fn find_next_slot(query: &SlotQuery<'_>) -> ScheduleResult<Allocation> {
    let mut windows = query.windows.to_vec();
    windows.sort_unstable();
    windows.dedup();

    let today = query.now.with_timezone(&query.tz).date_naive();
    for offset in 0..query.max_days {
        let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        if query.calendar.is_excluded(date) {
            continue;
        }
        for &time in &windows {
            let slot = Slot::new(date, time);
            if query.occupied.contains(&slot) {
                continue;
            }
            let Some(at) = slot.resolve(&query.tz) else {
                continue;
            };
            if at > query.now {
                return Ok(Allocation { slot, at });
            }
        }
    }

    Err(SchedulingError::SlotUnavailable {
        searched_days: query.max_days,
    })
}
