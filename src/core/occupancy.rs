//! Short-lived view of which slots are taken on the posting surface.
//!
//! The cache lives inside the scheduling lock. Every transaction starts with
//! [`OccupancyCache::invalidate`] followed by [`OccupancyCache::refresh`], so
//! a view is never reused across lock holds.

use std::collections::BTreeSet;

use chrono_tz::Tz;

use crate::core::error::{ScheduleResult, SchedulingError};
use crate::core::slot::Slot;
use crate::infra::surface::{PostingSurface, SurfaceError, SurfacePost};
use crate::util::retry::{with_retry_if, RetryPolicy};

/// Occupied slots as last read from the posting surface.
#[derive(Debug, Default)]
pub struct OccupancyCache {
    slots: BTreeSet<Slot>,
    posts: Vec<SurfacePost>,
    fresh: bool,
}

impl OccupancyCache {
    /// Empty, stale cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the current view.
    pub fn invalidate(&mut self) {
        self.slots.clear();
        self.posts.clear();
        self.fresh = false;
    }

    /// Whether the view was refreshed since the last invalidation.
    pub const fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// Re-read the surface listing, retrying transient failures.
    pub async fn refresh<P>(
        &mut self,
        surface: &P,
        tz: &Tz,
        retry: &RetryPolicy,
    ) -> ScheduleResult<&[SurfacePost]>
    where
        P: PostingSurface + ?Sized,
    {
        let posts = with_retry_if(retry, || surface.list(), SurfaceError::is_transient)
            .await
            .map_err(SchedulingError::ExternalReadFailed)?;
        self.absorb(posts, tz);
        tracing::debug!(occupied = self.slots.len(), "occupancy refreshed");
        Ok(&self.posts)
    }

    /// Replace the view with `posts`.
    pub fn absorb(&mut self, posts: Vec<SurfacePost>, tz: &Tz) {
        self.slots = posts.iter().map(|p| Slot::from_utc(p.time, tz)).collect();
        self.posts = posts;
        self.fresh = true;
    }

    /// Record a slot taken by this process or found taken during verification.
    pub fn mark_occupied(&mut self, slot: Slot) {
        self.slots.insert(slot);
    }

    /// Whether `slot` is taken.
    pub fn contains(&self, slot: &Slot) -> bool {
        self.slots.contains(slot)
    }

    /// All taken slots.
    pub const fn slots(&self) -> &BTreeSet<Slot> {
        &self.slots
    }

    /// Posts from the last refresh.
    pub fn posts(&self) -> &[SurfacePost] {
        &self.posts
    }
}
