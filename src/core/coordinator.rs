//! The scheduling transaction coordinator.
//!
//! Every operation that reads or changes post numbers or slots runs under a
//! single async mutex held across the posting-surface round-trips. Inside the
//! lock a transaction invalidates and refreshes the occupancy view, picks a
//! slot, reserves a number, writes to the surface and persists locally. A
//! failed write is fully rolled back before the lock is released, except when
//! the surface accepted a write that can no longer be withdrawn; those cases
//! surface as [`FailureOutcome::PartialState`](crate::core::FailureOutcome)
//! errors.
//!
//! Display reads ([`SchedulingCoordinator::scheduled_summary`],
//! [`SchedulingCoordinator::list_scheduled`]) and retention do not take the
//! lock.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use tokio::sync::{Mutex, MutexGuard};

use crate::config::{ConfigSource, ScheduleConfig};
use crate::core::audit::{build_audit_event, AuditAction, AuditSink};
use crate::core::entry::{Entry, EntryId, EntryStatus};
use crate::core::error::{ScheduleResult, SchedulingError};
use crate::core::ledger::{audit_sequence, SequenceLedger};
use crate::core::occupancy::OccupancyCache;
use crate::core::report::{
    ApprovalOutcome, DaySummary, NumberingReport, ReconcileReport, RepairReport, ScheduleSummary,
    SummaryLine, SwapDirection, UnscheduleOutcome,
};
use crate::core::slot::{find_next_slot, Allocation, Slot, SlotQuery};
use crate::infra::calendar::{CompositeCalendar, ExclusionCalendar};
use crate::infra::store::{EntryStore, StoreError};
use crate::infra::surface::{PostId, PostUpdate, PostingSurface, SurfaceError, SurfacePost};
use crate::util::clock::Clock;
use crate::util::retry::{with_retry_if, RetryPolicy};
use crate::util::text::{format_post_text, parse_post_number, preview, strip_post_number};

const PREVIEW_CHARS: usize = 50;

/// State that only exists inside the scheduling lock.
#[derive(Debug)]
struct LockedState {
    ledger: SequenceLedger,
    occupancy: OccupancyCache,
}

/// Settings resolved at the start of one transaction.
struct Txn {
    config: ScheduleConfig,
    tz: Tz,
    windows: Vec<NaiveTime>,
    calendar: CompositeCalendar,
    now: DateTime<Utc>,
}

/// A renumbering sweep that stopped before reaching the end.
struct SweepFailure {
    renumbered: usize,
    entry: EntryId,
    reason: String,
}

/// Serializes approvals, removals and every other numbering change.
pub struct SchedulingCoordinator<P, E> {
    surface: P,
    store: E,
    config: Arc<dyn ConfigSource>,
    holidays: Arc<dyn ExclusionCalendar>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
    state: Mutex<LockedState>,
}

impl<P, E> SchedulingCoordinator<P, E>
where
    P: PostingSurface,
    E: EntryStore,
{
    /// Assemble a coordinator. Prefer
    /// [`CoordinatorBuilder`](crate::builders::CoordinatorBuilder), which
    /// seeds the ledger from the store.
    pub fn new(
        surface: P,
        store: E,
        config: Arc<dyn ConfigSource>,
        holidays: Arc<dyn ExclusionCalendar>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
        ledger: SequenceLedger,
    ) -> Self {
        Self {
            surface,
            store,
            config,
            holidays,
            clock,
            audit,
            state: Mutex::new(LockedState {
                ledger,
                occupancy: OccupancyCache::new(),
            }),
        }
    }

    /// The posting surface.
    pub const fn surface(&self) -> &P {
        &self.surface
    }

    /// The entry store.
    pub const fn store(&self) -> &E {
        &self.store
    }

    /// Current ledger value. Waits for the scheduling lock.
    pub async fn next_number(&self) -> u64 {
        self.state.lock().await.ledger.peek()
    }

    // ------------------------------------------------------------------
    // Review gate
    // ------------------------------------------------------------------

    /// Record a new pending entry.
    pub async fn submit(&self, text: &str) -> ScheduleResult<Entry> {
        let body = normalize_text(text)?;
        let entry = Entry::new(body, self.clock.now());
        self.store.insert(&entry).await?;
        tracing::debug!(entry = %entry.id, "entry submitted");
        Ok(entry)
    }

    /// Fetch one entry.
    pub async fn entry(&self, id: EntryId) -> ScheduleResult<Entry> {
        self.load(id).await
    }

    /// `pending -> denied`.
    ///
    /// Review transitions take the scheduling lock so they cannot interleave
    /// with an approval of the same entry.
    pub async fn deny(&self, id: EntryId) -> ScheduleResult<Entry> {
        let (_state, txn) = self.begin().await?;
        let mut entry = self.load(id).await?;
        entry.deny(txn.now)?;
        self.store.update(&entry).await?;
        tracing::info!(entry = %id, "entry denied");
        Ok(entry)
    }

    /// `denied -> pending`.
    pub async fn restore(&self, id: EntryId) -> ScheduleResult<Entry> {
        let (_state, _txn) = self.begin().await?;
        let mut entry = self.load(id).await?;
        entry.restore()?;
        self.store.update(&entry).await?;
        tracing::info!(entry = %id, "entry restored");
        Ok(entry)
    }

    // ------------------------------------------------------------------
    // Approve / unschedule
    // ------------------------------------------------------------------

    /// Schedule a pending entry into the earliest free slot with the next
    /// number. `edited_text` replaces the entry's text when given.
    pub async fn approve(
        &self,
        id: EntryId,
        edited_text: Option<&str>,
    ) -> ScheduleResult<ApprovalOutcome> {
        let (mut state, txn) = self.begin().await?;
        let mut entry = self.load(id).await?;
        entry.require(EntryStatus::Pending, EntryStatus::Scheduled)?;
        let body = match edited_text {
            Some(text) => normalize_text(text)?,
            None => entry.text.clone(),
        };

        state.occupancy.invalidate();
        state
            .occupancy
            .refresh(&self.surface, &txn.tz, &txn.config.retry)
            .await?;
        let allocation = self.allocate_verified(&mut state.occupancy, &txn).await?;

        let number = state.ledger.reserve();
        let text = format_post_text(number, &body);
        let post_id = match self.create_post(&txn.config.retry, &text, allocation.at).await {
            Ok(post_id) => post_id,
            Err(source) => {
                state.ledger.rollback(number);
                self.record(
                    Some(id),
                    AuditAction::Rollback,
                    Some(number),
                    Some(allocation.at),
                    Some(source.to_string()),
                );
                tracing::warn!(entry = %id, number, error = %source, "create failed; reservation returned");
                return Err(SchedulingError::ExternalWriteFailed {
                    operation: "create",
                    source,
                });
            }
        };

        let original = entry.clone();
        entry.text = body;
        entry.schedule(number, allocation.at, post_id.clone())?;
        if let Err(err) = self.commit_approval(&entry, &state.ledger).await {
            return Err(self
                .compensate_approval(&mut state, &txn, &original, &post_id, number, allocation.at, err)
                .await);
        }

        state.occupancy.mark_occupied(allocation.slot);
        self.record_entry(AuditAction::Approve, &entry, None);
        tracing::info!(
            entry = %id,
            number,
            slot = %allocation.slot,
            post_id = %post_id,
            "entry scheduled"
        );
        Ok(ApprovalOutcome {
            entry_id: id,
            post_number: number,
            slot: allocation.slot,
            scheduled_time: allocation.at,
            post_id,
        })
    }

    /// Withdraw a scheduled entry back to pending and close the gap it
    /// leaves: every later entry moves one number down and into its
    /// predecessor's slot.
    ///
    /// An entry whose slot is not in the future is refused; `reconcile`
    /// records it as published instead.
    pub async fn unschedule(&self, id: EntryId) -> ScheduleResult<UnscheduleOutcome> {
        let (mut state, txn) = self.begin().await?;
        let mut entry = self.load(id).await?;
        entry.require(EntryStatus::Scheduled, EntryStatus::Pending)?;
        let (Some(number), Some(vacated)) = (entry.post_number, entry.scheduled_time) else {
            return Err(SchedulingError::InvalidRequest(format!(
                "scheduled entry {id} has no number or slot"
            )));
        };
        if vacated <= txn.now {
            return Err(SchedulingError::InvalidRequest(format!(
                "entry {id} was due at {vacated}; run reconcile to record it as published"
            )));
        }

        if let Some(post_id) = entry.post_id.clone() {
            match self.delete_post(&txn.config.retry, &post_id).await {
                Ok(()) => {}
                Err(SurfaceError::NotFound(_)) => {
                    tracing::warn!(entry = %id, post_id = %post_id, "post already gone from surface");
                }
                Err(source) => {
                    return Err(SchedulingError::ExternalWriteFailed {
                        operation: "delete",
                        source,
                    })
                }
            }
        }
        state.occupancy.invalidate();

        entry.unschedule()?;
        if let Err(err) = self.store.update(&entry).await {
            tracing::error!(entry = %id, error = %err, "post deleted but entry not updated");
            return Err(SchedulingError::PartialRenumberFailure {
                removed_number: number,
                renumbered: 0,
                failed_entry: id,
                reason: err.to_string(),
            });
        }
        self.record(
            Some(id),
            AuditAction::Unschedule,
            Some(number),
            Some(vacated),
            None,
        );

        let renumbered = self
            .close_gap(&mut state, &txn, id, number, vacated)
            .await?;
        tracing::info!(entry = %id, number, renumbered, "entry unscheduled");
        Ok(UnscheduleOutcome {
            entry_id: id,
            removed_number: number,
            renumbered,
        })
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Replace an entry's text. A leading `#<n>` is dropped; scheduled entries
    /// are updated on the surface with their number re-embedded.
    pub async fn edit_text(&self, id: EntryId, text: &str) -> ScheduleResult<Entry> {
        let body = normalize_text(text)?;
        let (_state, txn) = self.begin().await?;
        let mut entry = self.load(id).await?;
        match entry.status {
            EntryStatus::Pending | EntryStatus::Denied => {}
            EntryStatus::Scheduled => {
                let (Some(number), Some(post_id)) = (entry.post_number, entry.post_id.clone())
                else {
                    return Err(SchedulingError::InvalidRequest(format!(
                        "scheduled entry {id} has no number or post"
                    )));
                };
                self.update_post(
                    &txn.config.retry,
                    &post_id,
                    &PostUpdate::text(format_post_text(number, &body)),
                )
                .await
                .map_err(|source| SchedulingError::ExternalWriteFailed {
                    operation: "update",
                    source,
                })?;
            }
            EntryStatus::Published => {
                return Err(SchedulingError::InvalidRequest(format!(
                    "entry {id} is already published"
                )));
            }
        }

        entry.text = body;
        if let Err(err) = self.store.update(&entry).await {
            if entry.status == EntryStatus::Scheduled {
                return Err(unrecorded("edit", &entry, &err));
            }
            return Err(err.into());
        }
        if entry.status == EntryStatus::Scheduled {
            self.record_entry(AuditAction::Edit, &entry, None);
        }
        Ok(entry)
    }

    /// Exchange number and slot with the neighbouring scheduled entry.
    /// Returns the moved entry and its neighbour, both updated.
    pub async fn swap(
        &self,
        id: EntryId,
        direction: SwapDirection,
    ) -> ScheduleResult<(Entry, Entry)> {
        let (mut state, txn) = self.begin().await?;
        self.load(id)
            .await?
            .require(EntryStatus::Scheduled, EntryStatus::Scheduled)?;

        let scheduled = self.store.list_by_status(EntryStatus::Scheduled).await?;
        let idx = scheduled
            .iter()
            .position(|e| e.id == id)
            .ok_or(SchedulingError::EntryNotFound(id))?;
        let other_idx = match direction {
            SwapDirection::Earlier => idx.checked_sub(1),
            SwapDirection::Later => Some(idx + 1).filter(|&i| i < scheduled.len()),
        }
        .ok_or_else(|| {
            SchedulingError::InvalidRequest(format!("no {direction:?} scheduled entry to swap with"))
        })?;

        let mut first = scheduled[idx].clone();
        let mut second = scheduled[other_idx].clone();
        let (a_number, a_time, a_post) = placement(&first)?;
        let (b_number, b_time, b_post) = placement(&second)?;
        let retry = &txn.config.retry;

        self.update_post(
            retry,
            &a_post,
            &PostUpdate::moved(format_post_text(b_number, &first.text), b_time),
        )
        .await
        .map_err(|source| SchedulingError::ExternalWriteFailed {
            operation: "update",
            source,
        })?;

        if let Err(source) = self
            .update_post(
                retry,
                &b_post,
                &PostUpdate::moved(format_post_text(a_number, &second.text), a_time),
            )
            .await
        {
            let revert = PostUpdate::moved(format_post_text(a_number, &first.text), a_time);
            let reverted = self.update_post(retry, &a_post, &revert).await;
            return Err(match reverted {
                Ok(()) => SchedulingError::ExternalWriteFailed {
                    operation: "update",
                    source,
                },
                Err(revert_err) => SchedulingError::PartialCommit {
                    entry: first.id,
                    post_id: a_post,
                    reason: format!("swap half applied: {source}; revert failed: {revert_err}"),
                },
            });
        }

        first.post_number = Some(b_number);
        first.scheduled_time = Some(b_time);
        second.post_number = Some(a_number);
        second.scheduled_time = Some(a_time);
        state.occupancy.invalidate();
        for entry in [&first, &second] {
            if let Err(err) = self.store.update(entry).await {
                return Err(unrecorded("swap", entry, &err));
            }
        }

        self.record_entry(AuditAction::Swap, &first, None);
        self.record_entry(AuditAction::Swap, &second, None);
        tracing::info!(first = %first.id, second = %second.id, "entries swapped");
        Ok((first, second))
    }

    // ------------------------------------------------------------------
    // Reconciliation and numbering maintenance
    // ------------------------------------------------------------------

    /// Bring local state in line with the posting surface.
    ///
    /// - a scheduled entry whose post is gone and whose time has passed is
    ///   published;
    /// - one whose post is gone before its time is withdrawn to pending and
    ///   the numbers after it close up;
    /// - a local time that differs from the surface is overwritten;
    /// - a surface post unknown locally that carries a free `#<n>` is adopted.
    pub async fn reconcile(&self) -> ScheduleResult<ReconcileReport> {
        let (mut state, txn) = self.begin().await?;
        state.occupancy.invalidate();
        let posts: Vec<SurfacePost> = state
            .occupancy
            .refresh(&self.surface, &txn.tz, &txn.config.retry)
            .await?
            .to_vec();
        let by_id: HashMap<&str, &SurfacePost> =
            posts.iter().map(|p| (p.post_id.as_str(), p)).collect();

        let mut report = ReconcileReport::default();
        let mut orphans = Vec::new();
        let mut known: HashSet<PostId> = HashSet::new();

        for mut entry in self.store.list_by_status(EntryStatus::Scheduled).await? {
            let live = entry.post_id.as_deref().and_then(|pid| by_id.get(pid).copied());
            match live {
                Some(post) => {
                    known.insert(post.post_id.clone());
                    if entry.scheduled_time != Some(post.time) {
                        tracing::warn!(entry = %entry.id, surface_time = %post.time, "local time differs from surface");
                        entry.scheduled_time = Some(post.time);
                        self.store.update(&entry).await?;
                        report.realigned.push(entry.id);
                    }
                }
                None if entry.scheduled_time.is_some_and(|t| t <= txn.now) => {
                    entry.publish()?;
                    self.store.update(&entry).await?;
                    self.record_entry(AuditAction::Publish, &entry, None);
                    report.published.push(entry.id);
                }
                None => orphans.push(entry),
            }
        }

        // Highest first so each sweep only moves entries above the orphan.
        orphans.sort_by_key(|e| std::cmp::Reverse(e.post_number));
        for mut orphan in orphans {
            let (Some(number), Some(vacated)) = (orphan.post_number, orphan.scheduled_time) else {
                continue;
            };
            tracing::warn!(entry = %orphan.id, number, "post missing before its time; withdrawing");
            orphan.unschedule()?;
            self.store.update(&orphan).await?;
            self.record(
                Some(orphan.id),
                AuditAction::Unschedule,
                Some(number),
                Some(vacated),
                Some("post missing from surface".into()),
            );
            report.renumbered += self
                .close_gap(&mut state, &txn, orphan.id, number, vacated)
                .await?;
            report.withdrawn.push(orphan.id);
        }

        self.adopt_unknown(&mut state, &txn, &posts, &known, &mut report)
            .await?;
        state.occupancy.invalidate();

        if report.is_noop() {
            tracing::debug!("reconcile found nothing to change");
        } else {
            tracing::info!(
                published = report.published.len(),
                withdrawn = report.withdrawn.len(),
                realigned = report.realigned.len(),
                adopted = report.adopted.len(),
                "reconcile applied changes"
            );
        }
        Ok(report)
    }

    /// Scan numbered entries for gaps, duplicates and ledger drift.
    pub async fn verify_numbering(&self) -> ScheduleResult<NumberingReport> {
        let (state, _txn) = self.begin().await?;
        let entries = self.store.list_numbered().await?;
        let next_number = state.ledger.peek();
        let issues = audit_sequence(&entries, next_number);
        for issue in &issues {
            tracing::warn!(?issue, "numbering issue");
        }
        Ok(NumberingReport {
            next_number,
            checked: entries.len(),
            issues,
        })
    }

    /// Re-derive dense numbering from time order, starting at the lowest
    /// number present, push the new numbers to the surface and reset the
    /// ledger. Safe to run again after a failure.
    pub async fn repair_numbering(&self) -> ScheduleResult<RepairReport> {
        let (mut state, txn) = self.begin().await?;
        let entries = self.store.list_numbered().await?;
        let Some(base) = entries.iter().filter_map(|e| e.post_number).min() else {
            return Ok(RepairReport {
                relabelled: Vec::new(),
                next_number: state.ledger.peek(),
            });
        };

        let count = entries.len() as u64;
        let mut relabelled = Vec::new();
        for (expected, mut entry) in (base..).zip(entries) {
            if entry.post_number == Some(expected) {
                continue;
            }
            let previous = entry.post_number;
            let mut pushed = false;
            if entry.status == EntryStatus::Scheduled {
                if let Some(post_id) = entry.post_id.clone() {
                    self.update_post(
                        &txn.config.retry,
                        &post_id,
                        &PostUpdate::text(format_post_text(expected, &entry.text)),
                    )
                    .await
                    .map_err(|source| SchedulingError::ExternalWriteFailed {
                        operation: "update",
                        source,
                    })?;
                    pushed = true;
                }
            }
            entry.post_number = Some(expected);
            if let Err(err) = self.store.update(&entry).await {
                if pushed {
                    return Err(unrecorded("repair", &entry, &err));
                }
                return Err(err.into());
            }
            self.record_entry(
                AuditAction::Repair,
                &entry,
                previous.map(|p| format!("#{p} -> #{expected}")),
            );
            relabelled.push(entry.id);
        }

        let next_number = base + count;
        state.ledger.reset(next_number);
        self.persist_counter(&state.ledger).await?;
        tracing::info!(relabelled = relabelled.len(), next_number, "numbering repaired");
        Ok(RepairReport {
            relabelled,
            next_number,
        })
    }

    /// Overwrite the ledger. `next` must exceed every number in use.
    pub async fn set_next_number(&self, next: u64) -> ScheduleResult<()> {
        if next == 0 {
            return Err(SchedulingError::InvalidRequest(
                "post numbers start at 1".into(),
            ));
        }
        let (mut state, _txn) = self.begin().await?;
        let highest = self
            .store
            .list_numbered()
            .await?
            .iter()
            .filter_map(|e| e.post_number)
            .max();
        if let Some(highest) = highest.filter(|&h| next <= h) {
            return Err(SchedulingError::InvalidRequest(format!(
                "next number {next} must exceed highest number in use ({highest})"
            )));
        }
        let previous = state.ledger.peek();
        state.ledger.reset(next);
        self.persist_counter(&state.ledger).await?;
        self.record(
            None,
            AuditAction::LedgerReset,
            Some(next),
            None,
            Some(format!("was {previous}")),
        );
        tracing::info!(previous, next, "ledger reset");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lock-free reads and retention
    // ------------------------------------------------------------------

    /// Scheduled entries in time order.
    pub async fn list_scheduled(&self) -> ScheduleResult<Vec<Entry>> {
        Ok(self.store.list_by_status(EntryStatus::Scheduled).await?)
    }

    /// Scheduled posts grouped by local date.
    pub async fn scheduled_summary(&self) -> ScheduleResult<ScheduleSummary> {
        let tz = self.config.load()?.parse_timezone()?;
        let entries = self.store.list_by_status(EntryStatus::Scheduled).await?;

        let mut days: BTreeMap<chrono::NaiveDate, Vec<SummaryLine>> = BTreeMap::new();
        for entry in &entries {
            let Some(at) = entry.scheduled_time else {
                continue;
            };
            let slot = Slot::from_utc(at, &tz);
            days.entry(slot.date).or_default().push(SummaryLine {
                entry_id: entry.id,
                post_number: entry.post_number,
                time: slot.time,
                preview: preview(&entry.text, PREVIEW_CHARS),
            });
        }

        Ok(ScheduleSummary {
            total: days.values().map(Vec::len).sum(),
            days: days
                .into_iter()
                .map(|(date, mut posts)| {
                    posts.sort_by_key(|p| p.time);
                    DaySummary { date, posts }
                })
                .collect(),
        })
    }

    /// Delete denied and published entries older than the retention window.
    /// Returns how many were removed.
    pub async fn purge_expired(&self) -> ScheduleResult<usize> {
        let config = self.config.load()?;
        let cutoff = self.clock.now() - config.retention();

        let mut expired: Vec<EntryId> = self
            .store
            .list_by_status(EntryStatus::Denied)
            .await?
            .into_iter()
            .filter(|e| e.denied_at.unwrap_or(e.created_at) < cutoff)
            .map(|e| e.id)
            .collect();
        expired.extend(
            self.store
                .list_by_status(EntryStatus::Published)
                .await?
                .into_iter()
                .filter(|e| e.scheduled_time.is_some_and(|t| t < cutoff))
                .map(|e| e.id),
        );

        let mut removed = 0;
        for id in expired {
            if self.store.delete(id).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, %cutoff, "expired entries purged");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn settings(&self) -> ScheduleResult<Txn> {
        let config = self.config.load()?;
        let tz = config.parse_timezone()?;
        let windows = config.windows()?;
        let calendar = config.calendar(&self.holidays)?;
        Ok(Txn {
            config,
            tz,
            windows,
            calendar,
            now: self.clock.now(),
        })
    }

    async fn begin(&self) -> ScheduleResult<(MutexGuard<'_, LockedState>, Txn)> {
        let mut txn = self.settings()?;
        let guard = match txn.config.lock_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.state.lock())
                .await
                .map_err(|_| SchedulingError::LockTimeout(limit))?,
            None => self.state.lock().await,
        };
        txn.now = self.clock.now();
        Ok((guard, txn))
    }

    async fn load(&self, id: EntryId) -> ScheduleResult<Entry> {
        self.store
            .get(id)
            .await?
            .ok_or(SchedulingError::EntryNotFound(id))
    }

    async fn allocate_verified(
        &self,
        occupancy: &mut OccupancyCache,
        txn: &Txn,
    ) -> ScheduleResult<Allocation> {
        let attempts = txn.config.verify_retries;
        for attempt in 1..=attempts {
            let candidate = find_next_slot(&SlotQuery {
                now: txn.now,
                windows: &txn.windows,
                occupied: occupancy.slots(),
                calendar: &txn.calendar,
                max_days: txn.config.max_search_days,
                tz: txn.tz,
            })?;

            let listing = with_retry_if(
                &txn.config.retry,
                || self.surface.list(),
                SurfaceError::is_transient,
            )
            .await
            .map_err(SchedulingError::ExternalReadFailed)?;
            if !listing
                .iter()
                .any(|p| Slot::from_utc(p.time, &txn.tz) == candidate.slot)
            {
                return Ok(candidate);
            }

            tracing::warn!(attempt, slot = %candidate.slot, "candidate slot taken externally; recomputing");
            occupancy.absorb(listing, &txn.tz);
            occupancy.mark_occupied(candidate.slot);
        }
        Err(SchedulingError::SlotContended { attempts })
    }

    async fn commit_approval(
        &self,
        entry: &Entry,
        ledger: &SequenceLedger,
    ) -> Result<(), StoreError> {
        self.store.update(entry).await?;
        self.store.save_next_number(ledger.peek()).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn compensate_approval(
        &self,
        state: &mut LockedState,
        txn: &Txn,
        original: &Entry,
        post_id: &str,
        number: u64,
        at: DateTime<Utc>,
        err: StoreError,
    ) -> SchedulingError {
        tracing::warn!(entry = %original.id, post_id, error = %err, "persist failed after create; withdrawing post");
        match self.delete_post(&txn.config.retry, post_id).await {
            Ok(()) | Err(SurfaceError::NotFound(_)) => {
                state.ledger.rollback(number);
                if let Err(e) = self.store.update(original).await {
                    tracing::warn!(entry = %original.id, error = %e, "could not restore pending entry");
                }
                if let Err(e) = self.persist_counter(&state.ledger).await {
                    tracing::warn!(error = %e, "could not restore persisted counter");
                }
                self.record(
                    Some(original.id),
                    AuditAction::Rollback,
                    Some(number),
                    Some(at),
                    Some(err.to_string()),
                );
                SchedulingError::Store(err)
            }
            Err(delete_err) => {
                tracing::error!(
                    entry = %original.id,
                    post_id,
                    error = %delete_err,
                    "post created but neither recorded nor withdrawn"
                );
                SchedulingError::PartialCommit {
                    entry: original.id,
                    post_id: post_id.to_string(),
                    reason: format!("{err}; withdrawal failed: {delete_err}"),
                }
            }
        }
    }

    /// Run the renumbering sweep after `removed` left the sequence, then
    /// decrement and persist the ledger.
    async fn close_gap(
        &self,
        state: &mut LockedState,
        txn: &Txn,
        removed: EntryId,
        number: u64,
        vacated: DateTime<Utc>,
    ) -> ScheduleResult<usize> {
        match self.shift_down(txn, removed, number, vacated).await {
            Ok(renumbered) => {
                state.ledger.adjust(-1);
                self.persist_counter(&state.ledger).await?;
                Ok(renumbered)
            }
            Err(failure) => {
                self.record(
                    Some(failure.entry),
                    AuditAction::RenumberFailed,
                    None,
                    None,
                    Some(failure.reason.clone()),
                );
                tracing::error!(
                    removed_number = number,
                    renumbered = failure.renumbered,
                    entry = %failure.entry,
                    reason = %failure.reason,
                    "renumbering stopped; run repair_numbering"
                );
                Err(SchedulingError::PartialRenumberFailure {
                    removed_number: number,
                    renumbered: failure.renumbered,
                    failed_entry: failure.entry,
                    reason: failure.reason,
                })
            }
        }
    }

    async fn shift_down(
        &self,
        txn: &Txn,
        removed: EntryId,
        number: u64,
        vacated: DateTime<Utc>,
    ) -> Result<usize, SweepFailure> {
        let followers = self
            .store
            .list_numbered_above(number)
            .await
            .map_err(|e| SweepFailure {
                renumbered: 0,
                entry: removed,
                reason: e.to_string(),
            })?;

        let mut target = vacated;
        let mut renumbered = 0;
        for mut follower in followers
            .into_iter()
            .filter(|e| e.status == EntryStatus::Scheduled)
        {
            let (Some(old_number), Some(old_time)) = (follower.post_number, follower.scheduled_time)
            else {
                continue;
            };
            let new_number = old_number - 1;
            let follower_id = follower.id;
            let fail = move |reason: String| SweepFailure {
                renumbered,
                entry: follower_id,
                reason,
            };

            if let Some(post_id) = follower.post_id.as_deref() {
                let update = PostUpdate::moved(format_post_text(new_number, &follower.text), target);
                self.update_post(&txn.config.retry, post_id, &update)
                    .await
                    .map_err(|e| fail(e.to_string()))?;
            }
            follower.post_number = Some(new_number);
            follower.scheduled_time = Some(target);
            self.store
                .update(&follower)
                .await
                .map_err(|e| fail(e.to_string()))?;

            self.record_entry(
                AuditAction::Renumber,
                &follower,
                Some(format!("#{old_number} -> #{new_number}")),
            );
            tracing::debug!(entry = %follower.id, old_number, new_number, "entry relabelled");
            renumbered += 1;
            target = old_time;
        }
        Ok(renumbered)
    }

    async fn adopt_unknown(
        &self,
        state: &mut LockedState,
        txn: &Txn,
        posts: &[SurfacePost],
        known: &HashSet<PostId>,
        report: &mut ReconcileReport,
    ) -> ScheduleResult<()> {
        let unknown: Vec<&SurfacePost> = posts
            .iter()
            .filter(|p| !known.contains(&p.post_id))
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }

        let numbered = self.store.list_numbered().await?;
        let mut used_numbers: HashSet<u64> = numbered.iter().filter_map(|e| e.post_number).collect();
        let mut used_times: HashSet<DateTime<Utc>> =
            numbered.iter().filter_map(|e| e.scheduled_time).collect();

        for post in unknown {
            let adoptable = parse_post_number(&post.text)
                .filter(|n| !used_numbers.contains(n) && !used_times.contains(&post.time));
            let Some(number) = adoptable else {
                tracing::warn!(post_id = %post.post_id, "surface post could not be matched");
                report.unmatched_posts.push(post.post_id.clone());
                continue;
            };

            let mut entry = Entry::new(strip_post_number(&post.text), txn.now);
            entry.schedule(number, post.time, post.post_id.clone())?;
            self.store.insert(&entry).await?;
            used_numbers.insert(number);
            used_times.insert(post.time);
            if number >= state.ledger.peek() {
                state.ledger.reset(number + 1);
            }
            self.record_entry(AuditAction::Adopt, &entry, None);
            tracing::info!(entry = %entry.id, number, post_id = %post.post_id, "surface post adopted");
            report.adopted.push(entry.id);
        }
        self.persist_counter(&state.ledger).await
    }

    async fn persist_counter(&self, ledger: &SequenceLedger) -> ScheduleResult<()> {
        Ok(self.store.save_next_number(ledger.peek()).await?)
    }

    async fn create_post(
        &self,
        retry: &RetryPolicy,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<PostId, SurfaceError> {
        with_retry_if(retry, || self.surface.create(text, at), SurfaceError::is_transient).await
    }

    async fn update_post(
        &self,
        retry: &RetryPolicy,
        post_id: &str,
        update: &PostUpdate,
    ) -> Result<(), SurfaceError> {
        with_retry_if(
            retry,
            || self.surface.update(post_id, update),
            SurfaceError::is_transient,
        )
        .await
    }

    async fn delete_post(&self, retry: &RetryPolicy, post_id: &str) -> Result<(), SurfaceError> {
        with_retry_if(retry, || self.surface.delete(post_id), SurfaceError::is_transient).await
    }

    fn record_entry(&self, action: AuditAction, entry: &Entry, detail: Option<String>) {
        self.record(
            Some(entry.id),
            action,
            entry.post_number,
            entry.scheduled_time,
            detail,
        );
    }

    fn record(
        &self,
        entry: Option<EntryId>,
        action: AuditAction,
        post_number: Option<u64>,
        scheduled_time: Option<DateTime<Utc>>,
        detail: Option<String>,
    ) {
        self.audit.record(build_audit_event(
            entry,
            action,
            post_number,
            scheduled_time,
            detail,
        ));
    }
}

fn normalize_text(text: &str) -> ScheduleResult<String> {
    let body = strip_post_number(text).trim();
    if body.is_empty() {
        return Err(SchedulingError::InvalidRequest("post text is empty".into()));
    }
    Ok(body.to_string())
}

/// A surface write succeeded but the matching local write did not.
fn unrecorded(operation: &str, entry: &Entry, err: &StoreError) -> SchedulingError {
    tracing::error!(
        entry = %entry.id,
        operation,
        error = %err,
        "surface updated but entry not recorded"
    );
    SchedulingError::PartialCommit {
        entry: entry.id,
        post_id: entry.post_id.clone().unwrap_or_default(),
        reason: format!("{operation}: {err}"),
    }
}

fn placement(entry: &Entry) -> ScheduleResult<(u64, DateTime<Utc>, PostId)> {
    match (entry.post_number, entry.scheduled_time, entry.post_id.clone()) {
        (Some(number), Some(time), Some(post_id)) => Ok((number, time, post_id)),
        _ => Err(SchedulingError::InvalidRequest(format!(
            "scheduled entry {} has no number, slot or post",
            entry.id
        ))),
    }
}
