//! Exclusion calendars.
//!
//! A calendar marks whole dates as ineligible for publication. The holiday
//! computation itself lives outside this crate and is plugged in through
//! [`FnCalendar`]; the weekday and fixed-date rules cover the configurable part.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};

/// Pure predicate over dates.
pub trait ExclusionCalendar: Send + Sync {
    /// Whether nothing may be published on `date`.
    fn is_excluded(&self, date: NaiveDate) -> bool;
}

impl<T: ExclusionCalendar + ?Sized> ExclusionCalendar for Arc<T> {
    fn is_excluded(&self, date: NaiveDate) -> bool {
        (**self).is_excluded(date)
    }
}

/// Calendar with no excluded dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusions;

impl ExclusionCalendar for NoExclusions {
    fn is_excluded(&self, _date: NaiveDate) -> bool {
        false
    }
}

/// Excludes fixed weekdays, e.g. Saturday.
#[derive(Debug, Clone, Default)]
pub struct WeekdayExclusion {
    days: Vec<Weekday>,
}

impl WeekdayExclusion {
    /// Exclude every date falling on one of `days`.
    pub fn new(days: impl IntoIterator<Item = Weekday>) -> Self {
        let mut days: Vec<Weekday> = days.into_iter().collect();
        days.sort_by_key(Weekday::num_days_from_monday);
        days.dedup();
        Self { days }
    }
}

impl ExclusionCalendar for WeekdayExclusion {
    fn is_excluded(&self, date: NaiveDate) -> bool {
        self.days.contains(&date.weekday())
    }
}

/// Excludes an explicit set of dates.
#[derive(Debug, Clone, Default)]
pub struct DateListExclusion {
    dates: BTreeSet<NaiveDate>,
}

impl DateListExclusion {
    /// Exclude exactly `dates`.
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }
}

impl ExclusionCalendar for DateListExclusion {
    fn is_excluded(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }
}

/// Adapter for an external predicate such as a holiday service.
pub struct FnCalendar<F> {
    predicate: F,
}

impl<F> FnCalendar<F>
where
    F: Fn(NaiveDate) -> bool + Send + Sync,
{
    /// Wrap `predicate`.
    pub const fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<F> fmt::Debug for FnCalendar<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCalendar").finish_non_exhaustive()
    }
}

impl<F> ExclusionCalendar for FnCalendar<F>
where
    F: Fn(NaiveDate) -> bool + Send + Sync,
{
    fn is_excluded(&self, date: NaiveDate) -> bool {
        (self.predicate)(date)
    }
}

/// Excludes a date when any part excludes it.
#[derive(Clone, Default)]
pub struct CompositeCalendar {
    parts: Vec<Arc<dyn ExclusionCalendar>>,
}

impl CompositeCalendar {
    /// Empty composite (excludes nothing).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule.
    #[must_use]
    pub fn with(mut self, part: Arc<dyn ExclusionCalendar>) -> Self {
        self.parts.push(part);
        self
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Whether no rule is configured.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Debug for CompositeCalendar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeCalendar")
            .field("parts", &self.parts.len())
            .finish()
    }
}

impl ExclusionCalendar for CompositeCalendar {
    fn is_excluded(&self, date: NaiveDate) -> bool {
        self.parts.iter().any(|p| p.is_excluded(date))
    }
}
