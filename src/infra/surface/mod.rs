//! Posting surface backends.
//!
//! The posting surface is the external system that actually publishes posts.
//! It is authoritative for what is currently scheduled, and every call is a
//! network round-trip that may fail or stall.

#[cfg(feature = "graph-client")]
pub mod graph;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "graph-client")]
pub use graph::{GraphSurface, GraphSurfaceConfig};
pub use memory::{InMemorySurface, SurfaceOp};

/// Identifier assigned to a post by the surface.
pub type PostId = String;

/// Failures reported by a posting surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// Temporary failure (timeout, throttling, 5xx); the call may be retried.
    #[error("transient surface failure: {0}")]
    Transient(String),
    /// The request was rejected and will not succeed on retry.
    #[error("permanent surface failure: {0}")]
    Permanent(String),
    /// The referenced post does not exist.
    #[error("post not found: {0}")]
    NotFound(String),
}

impl SurfaceError {
    /// Whether retrying the same call may succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A post that is scheduled on the surface and has not fired yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacePost {
    /// Surface identifier.
    pub post_id: PostId,
    /// Full post text, including the number prefix.
    pub text: String,
    /// Publication time.
    pub time: DateTime<Utc>,
}

/// Change applied to an existing scheduled post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostUpdate {
    /// Replacement text.
    pub text: String,
    /// New publication time, if it moves.
    pub time: Option<DateTime<Utc>>,
}

impl PostUpdate {
    /// Replace only the text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            time: None,
        }
    }

    /// Replace the text and move the post.
    pub fn moved(text: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            time: Some(time),
        }
    }
}

/// Client for the external publication system.
#[async_trait]
pub trait PostingSurface: Send + Sync {
    /// Schedule a new post at `time`.
    async fn create(&self, text: &str, time: DateTime<Utc>) -> Result<PostId, SurfaceError>;

    /// List posts that are scheduled and not yet published.
    async fn list(&self) -> Result<Vec<SurfacePost>, SurfaceError>;

    /// Change the text, and optionally the time, of a scheduled post.
    async fn update(&self, post_id: &str, update: &PostUpdate) -> Result<(), SurfaceError>;

    /// Remove a scheduled post.
    async fn delete(&self, post_id: &str) -> Result<(), SurfaceError>;
}

#[async_trait]
impl<T: PostingSurface + ?Sized> PostingSurface for Arc<T> {
    async fn create(&self, text: &str, time: DateTime<Utc>) -> Result<PostId, SurfaceError> {
        (**self).create(text, time).await
    }

    async fn list(&self) -> Result<Vec<SurfacePost>, SurfaceError> {
        (**self).list().await
    }

    async fn update(&self, post_id: &str, update: &PostUpdate) -> Result<(), SurfaceError> {
        (**self).update(post_id, update).await
    }

    async fn delete(&self, post_id: &str) -> Result<(), SurfaceError> {
        (**self).delete(post_id).await
    }
}
