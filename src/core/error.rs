//! Error types for scheduling operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::entry::{EntryId, EntryStatus};
use crate::infra::store::StoreError;
use crate::infra::surface::SurfaceError;

/// What a failed operation left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOutcome {
    /// Nothing changed locally or externally; retrying is safe.
    NothingHappened,
    /// Local and external state may have diverged; do not retry blindly.
    PartialState,
}

/// Errors produced by the scheduling engine.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// No free, non-excluded slot within the search bound.
    #[error("no slot available within {searched_days} days")]
    SlotUnavailable {
        /// Number of days searched.
        searched_days: u32,
    },
    /// Candidate slots kept being taken externally between refresh and verify.
    #[error("slot contended: candidate taken {attempts} times")]
    SlotContended {
        /// Verification attempts made.
        attempts: u32,
    },
    /// Reading the posting surface failed.
    #[error("posting surface read failed: {0}")]
    ExternalReadFailed(#[source] SurfaceError),
    /// The posting surface rejected a write; the transaction was rolled back.
    #[error("posting surface {operation} failed: {source}")]
    ExternalWriteFailed {
        /// Operation that failed (create, update, delete).
        operation: &'static str,
        /// Underlying surface error.
        #[source]
        source: SurfaceError,
    },
    /// The surface accepted a write that could not be recorded locally, and
    /// for a new post could not be withdrawn either.
    #[error("post {post_id} changed for entry {entry} but not recorded: {reason}")]
    PartialCommit {
        /// Entry whose local record is behind the surface.
        entry: EntryId,
        /// Identifier of the post on the surface.
        post_id: String,
        /// Why the local commit failed.
        reason: String,
    },
    /// Renumbering stopped midway; local and external numbering diverged.
    #[error(
        "renumbering after removal of #{removed_number} stopped at entry {failed_entry} \
         ({renumbered} relabelled): {reason}"
    )]
    PartialRenumberFailure {
        /// Number that was removed from the sequence.
        removed_number: u64,
        /// Relabels that completed before the failure.
        renumbered: usize,
        /// Entry whose relabel failed.
        failed_entry: EntryId,
        /// Underlying failure.
        reason: String,
    },
    /// Waiting for the scheduling lock exceeded the configured bound.
    #[error("scheduling lock not acquired within {0:?}")]
    LockTimeout(Duration),
    /// No entry with the given identifier.
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),
    /// The entry's state does not allow the requested transition.
    #[error("invalid transition for entry {entry}: {from} -> {to}")]
    InvalidTransition {
        /// Entry concerned.
        entry: EntryId,
        /// Current status.
        from: EntryStatus,
        /// Requested status.
        to: EntryStatus,
    },
    /// The request is malformed or conflicts with current state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Entry store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchedulingError {
    /// Classify the state left behind by this error.
    pub const fn outcome(&self) -> FailureOutcome {
        match self {
            Self::PartialCommit { .. } | Self::PartialRenumberFailure { .. } => {
                FailureOutcome::PartialState
            }
            _ => FailureOutcome::NothingHappened,
        }
    }

    /// Whether the caller may simply try again later.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::LockTimeout(_) | Self::SlotContended { .. } => true,
            Self::ExternalReadFailed(e) => e.is_transient(),
            Self::ExternalWriteFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Result alias for scheduling operations.
pub type ScheduleResult<T> = Result<T, SchedulingError>;

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
