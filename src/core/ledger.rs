//! The sequence ledger: the next post number to hand out.
//!
//! The ledger is authoritative. It is never derived by scanning entries;
//! [`audit_sequence`] scans only to report drift.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entry::{Entry, EntryId};

/// Monotonic next-number counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLedger {
    next: u64,
}

impl Default for SequenceLedger {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl SequenceLedger {
    /// Ledger whose next number is `next` (at least 1).
    pub fn new(next: u64) -> Self {
        Self { next: next.max(1) }
    }

    /// Number the next reservation will receive.
    pub const fn peek(&self) -> u64 {
        self.next
    }

    /// Hand out the next number.
    pub fn reserve(&mut self) -> u64 {
        let number = self.next;
        self.next += 1;
        number
    }

    /// Return `number` if it is the most recent reservation. Returns whether
    /// the counter moved.
    pub fn rollback(&mut self, number: u64) -> bool {
        if number > 0 && self.next == number + 1 {
            self.next = number;
            true
        } else {
            tracing::warn!(number, next = self.next, "rollback of a non-latest reservation ignored");
            false
        }
    }

    /// Shift the counter by `delta`, never below 1.
    pub fn adjust(&mut self, delta: i64) {
        self.next = self.next.saturating_add_signed(delta).max(1);
    }

    /// Overwrite the counter.
    pub fn reset(&mut self, next: u64) {
        self.next = next.max(1);
    }
}

/// A departure from dense, collision-free numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SequenceIssue {
    /// A numbered entry lacks its number or slot.
    Incomplete {
        /// Entry concerned.
        entry: EntryId,
    },
    /// Several entries carry the same number.
    DuplicateNumber {
        /// Shared number.
        number: u64,
        /// Entries carrying it.
        entries: Vec<EntryId>,
    },
    /// Several entries share a publication time.
    TimeCollision {
        /// Shared time.
        time: DateTime<Utc>,
        /// Entries at that time.
        entries: Vec<EntryId>,
    },
    /// In time order, the entry does not carry the number it should.
    OutOfSequence {
        /// Entry concerned.
        entry: EntryId,
        /// Number carried.
        actual: u64,
        /// Number expected from its position.
        expected: u64,
    },
    /// The ledger does not continue the sequence.
    LedgerMismatch {
        /// Counter value.
        actual: u64,
        /// Value implied by the entries.
        expected: u64,
    },
}

/// Check numbered entries against the ledger.
///
/// `entries` may be in any order and may include unnumbered entries, which
/// are ignored. The sequence base is the lowest number present, so entries
/// removed by retention do not count as gaps.
pub fn audit_sequence(entries: &[Entry], next: u64) -> Vec<SequenceIssue> {
    let mut issues = Vec::new();
    let mut numbered: Vec<(DateTime<Utc>, u64, EntryId)> = Vec::new();

    for entry in entries.iter().filter(|e| e.status.is_numbered()) {
        match (entry.scheduled_time, entry.post_number) {
            (Some(time), Some(number)) => numbered.push((time, number, entry.id)),
            _ => issues.push(SequenceIssue::Incomplete { entry: entry.id }),
        }
    }
    numbered.sort_unstable();

    let mut by_number: HashMap<u64, Vec<EntryId>> = HashMap::new();
    let mut by_time: HashMap<DateTime<Utc>, Vec<EntryId>> = HashMap::new();
    for &(time, number, id) in &numbered {
        by_number.entry(number).or_default().push(id);
        by_time.entry(time).or_default().push(id);
    }

    let mut duplicates: Vec<_> = by_number
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .collect();
    duplicates.sort_unstable_by_key(|(number, _)| *number);
    issues.extend(
        duplicates
            .into_iter()
            .map(|(number, entries)| SequenceIssue::DuplicateNumber { number, entries }),
    );

    let mut collisions: Vec<_> = by_time.into_iter().filter(|(_, ids)| ids.len() > 1).collect();
    collisions.sort_unstable_by_key(|(time, _)| *time);
    issues.extend(
        collisions
            .into_iter()
            .map(|(time, entries)| SequenceIssue::TimeCollision { time, entries }),
    );

    let Some(base) = numbered.iter().map(|&(_, n, _)| n).min() else {
        return issues;
    };
    for (expected, &(_, actual, entry)) in (base..).zip(&numbered) {
        if actual != expected {
            issues.push(SequenceIssue::OutOfSequence {
                entry,
                actual,
                expected,
            });
        }
    }

    let expected_next = base + numbered.len() as u64;
    if next != expected_next {
        issues.push(SequenceIssue::LedgerMismatch {
            actual: next,
            expected: expected_next,
        });
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduled(number: u64, hour: u32) -> Entry {
        let created = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let mut entry = Entry::new(format!("entry {number}"), created);
        entry
            .schedule(
                number,
                Utc.with_ymd_and_hms(2026, 6, 1, hour, 0, 0).unwrap(),
                format!("post-{number}"),
            )
            .unwrap();
        entry
    }

    #[test]
    fn test_reserve_and_rollback() {
        let mut ledger = SequenceLedger::default();
        assert_eq!(ledger.reserve(), 1);
        assert_eq!(ledger.reserve(), 2);
        assert!(!ledger.rollback(1));
        assert!(ledger.rollback(2));
        assert_eq!(ledger.peek(), 2);
    }

    #[test]
    fn test_adjust_never_below_one() {
        let mut ledger = SequenceLedger::new(3);
        ledger.adjust(-1);
        assert_eq!(ledger.peek(), 2);
        ledger.adjust(-10);
        assert_eq!(ledger.peek(), 1);
        ledger.adjust(4);
        assert_eq!(ledger.peek(), 5);
        ledger.reset(0);
        assert_eq!(ledger.peek(), 1);
    }

    #[test]
    fn test_dense_sequence_is_clean() {
        let entries = vec![scheduled(7, 14), scheduled(6, 9), scheduled(8, 19)];
        assert!(audit_sequence(&entries, 9).is_empty());
        assert!(audit_sequence(&[], 42).is_empty());
    }

    #[test]
    fn test_detects_gap_and_ledger_drift() {
        let entries = vec![scheduled(1, 9), scheduled(3, 14)];
        let issues = audit_sequence(&entries, 4);
        assert!(issues.contains(&SequenceIssue::OutOfSequence {
            entry: entries[1].id,
            actual: 3,
            expected: 2,
        }));
        assert!(issues.contains(&SequenceIssue::LedgerMismatch {
            actual: 4,
            expected: 3,
        }));
    }

    #[test]
    fn test_detects_duplicates_and_collisions() {
        let a = scheduled(1, 9);
        let b = scheduled(1, 9);
        let issues = audit_sequence(&[a, b], 3);
        assert!(issues
            .iter()
            .any(|i| matches!(i, SequenceIssue::DuplicateNumber { number: 1, .. })));
        assert!(issues
            .iter()
            .any(|i| matches!(i, SequenceIssue::TimeCollision { .. })));
    }

    #[test]
    fn test_pending_entries_are_ignored() {
        let pending = Entry::new("later", Utc::now());
        let entries = vec![scheduled(2, 9), pending];
        assert!(audit_sequence(&entries, 3).is_empty());
    }
}
