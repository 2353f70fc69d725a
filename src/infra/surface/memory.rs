//! In-memory posting surface for development and testing.
//!
//! Besides storing posts it can script failures per operation, add latency to
//! widen race windows, and simulate writers outside this process.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{PostId, PostUpdate, PostingSurface, SurfaceError, SurfacePost};

/// Surface operation, used to script failures and count calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceOp {
    /// `create`.
    Create,
    /// `list`.
    List,
    /// `update`.
    Update,
    /// `delete`.
    Delete,
}

/// A post inserted by "someone else" once `list` has been called enough times.
struct PendingExternal {
    after_lists: usize,
    text: String,
    time: DateTime<Utc>,
}

#[derive(Default)]
struct SurfaceState {
    posts: BTreeMap<PostId, SurfacePost>,
    next_id: u64,
    scripts: HashMap<SurfaceOp, VecDeque<Option<SurfaceError>>>,
    calls: HashMap<SurfaceOp, usize>,
    externals: Vec<PendingExternal>,
}

impl SurfaceState {
    fn begin(&mut self, op: SurfaceOp) -> Result<(), SurfaceError> {
        *self.calls.entry(op).or_default() += 1;
        match self.scripts.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, text: String, time: DateTime<Utc>) -> PostId {
        self.next_id += 1;
        let post_id = format!("post-{}", self.next_id);
        self.posts.insert(
            post_id.clone(),
            SurfacePost {
                post_id: post_id.clone(),
                text,
                time,
            },
        );
        post_id
    }
}

/// Posting surface that keeps posts in memory.
#[derive(Default)]
pub struct InMemorySurface {
    state: Mutex<SurfaceState>,
    latency: Option<Duration>,
}

impl InMemorySurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long before every operation.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next call of `op` with `err`.
    pub fn fail_next(&self, op: SurfaceOp, err: SurfaceError) {
        self.script(op, [Some(err)]);
    }

    /// Queue outcomes for upcoming calls of `op`; `None` lets a call through.
    pub fn script(&self, op: SurfaceOp, outcomes: impl IntoIterator<Item = Option<SurfaceError>>) {
        let mut state = self.state.lock();
        state.scripts.entry(op).or_default().extend(outcomes);
    }

    /// Number of times `op` has been called.
    pub fn calls(&self, op: SurfaceOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or_default()
    }

    /// Insert a post directly, as another client of the surface would.
    pub fn insert_external(&self, text: impl Into<String>, time: DateTime<Utc>) -> PostId {
        self.state.lock().insert(text.into(), time)
    }

    /// Insert a post right after the `after_lists`-th call to `list` returns.
    pub fn insert_external_after_lists(
        &self,
        after_lists: usize,
        text: impl Into<String>,
        time: DateTime<Utc>,
    ) {
        self.state.lock().externals.push(PendingExternal {
            after_lists,
            text: text.into(),
            time,
        });
    }

    /// Remove a post directly, bypassing scripts.
    pub fn remove_external(&self, post_id: &str) -> bool {
        self.state.lock().posts.remove(post_id).is_some()
    }

    /// Drop every post whose time is at or before `now`, as publication does.
    pub fn fire_due(&self, now: DateTime<Utc>) -> Vec<SurfacePost> {
        let mut state = self.state.lock();
        let due: Vec<PostId> = state
            .posts
            .values()
            .filter(|p| p.time <= now)
            .map(|p| p.post_id.clone())
            .collect();
        due.iter()
            .filter_map(|id| state.posts.remove(id))
            .collect()
    }

    /// Snapshot of all posts ordered by time.
    pub fn posts(&self) -> Vec<SurfacePost> {
        let mut posts: Vec<SurfacePost> = self.state.lock().posts.values().cloned().collect();
        posts.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.post_id.cmp(&b.post_id)));
        posts
    }

    /// Look up one post.
    pub fn post(&self, post_id: &str) -> Option<SurfacePost> {
        self.state.lock().posts.get(post_id).cloned()
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl PostingSurface for InMemorySurface {
    async fn create(&self, text: &str, time: DateTime<Utc>) -> Result<PostId, SurfaceError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(SurfaceOp::Create)?;
        Ok(state.insert(text.to_string(), time))
    }

    async fn list(&self) -> Result<Vec<SurfacePost>, SurfaceError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(SurfaceOp::List)?;
        let mut posts: Vec<SurfacePost> = state.posts.values().cloned().collect();
        posts.sort_by(|a, b| a.time.cmp(&b.time));

        let lists = state.calls.get(&SurfaceOp::List).copied().unwrap_or_default();
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.externals)
            .into_iter()
            .partition(|e| e.after_lists <= lists);
        state.externals = waiting;
        for external in ready {
            state.insert(external.text, external.time);
        }
        Ok(posts)
    }

    async fn update(&self, post_id: &str, update: &PostUpdate) -> Result<(), SurfaceError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(SurfaceOp::Update)?;
        let post = state
            .posts
            .get_mut(post_id)
            .ok_or_else(|| SurfaceError::NotFound(post_id.to_string()))?;
        post.text.clone_from(&update.text);
        if let Some(time) = update.time {
            post.time = time;
        }
        Ok(())
    }

    async fn delete(&self, post_id: &str) -> Result<(), SurfaceError> {
        self.pause().await;
        let mut state = self.state.lock();
        state.begin(SurfaceOp::Delete)?;
        state
            .posts
            .remove(post_id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::NotFound(post_id.to_string()))
    }
}
