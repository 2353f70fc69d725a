//! API-facing request/response models.
//!
//! Thin adapters between a transport (HTTP handler, CLI, review UI) and the
//! coordinator. Errors are flattened into [`ErrorResponse`] so callers can
//! decide whether to retry without matching on [`SchedulingError`].

use serde::{Deserialize, Serialize};

use crate::core::{
    ApprovalOutcome, Entry, EntryId, FailureOutcome, SchedulingCoordinator, SchedulingError,
    SwapDirection, UnscheduleOutcome,
};
use crate::infra::store::EntryStore;
use crate::infra::surface::PostingSurface;

/// New content from the ingestion side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Post body.
    pub text: String,
}

/// Reviewer approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveRequest {
    /// Entry to schedule.
    pub entry_id: EntryId,
    /// Replacement text edited during review.
    #[serde(default)]
    pub edited_text: Option<String>,
}

/// Text edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRequest {
    /// Entry to edit.
    pub entry_id: EntryId,
    /// New text.
    pub text: String,
}

/// Reordering request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Entry to move.
    pub entry_id: EntryId,
    /// Which neighbour to exchange with.
    pub direction: SwapDirection,
}

/// Error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub message: String,
    /// What the failure left behind.
    pub outcome: FailureOutcome,
    /// Whether the same request may simply be sent again.
    pub retryable: bool,
}

impl From<&SchedulingError> for ErrorResponse {
    fn from(err: &SchedulingError) -> Self {
        Self {
            message: err.to_string(),
            outcome: err.outcome(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<SchedulingError> for ErrorResponse {
    fn from(err: SchedulingError) -> Self {
        Self::from(&err)
    }
}

/// Submit new content.
pub async fn submit_entry<P, E>(
    coordinator: &SchedulingCoordinator<P, E>,
    req: SubmitRequest,
) -> Result<Entry, ErrorResponse>
where
    P: PostingSurface,
    E: EntryStore,
{
    Ok(coordinator.submit(&req.text).await?)
}

/// Approve an entry.
pub async fn approve_entry<P, E>(
    coordinator: &SchedulingCoordinator<P, E>,
    req: ApproveRequest,
) -> Result<ApprovalOutcome, ErrorResponse>
where
    P: PostingSurface,
    E: EntryStore,
{
    coordinator
        .approve(req.entry_id, req.edited_text.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(entry = %req.entry_id, error = %e, "approve request failed");
            ErrorResponse::from(e)
        })
}

/// Withdraw a scheduled entry.
pub async fn unschedule_entry<P, E>(
    coordinator: &SchedulingCoordinator<P, E>,
    entry_id: EntryId,
) -> Result<UnscheduleOutcome, ErrorResponse>
where
    P: PostingSurface,
    E: EntryStore,
{
    Ok(coordinator.unschedule(entry_id).await?)
}

/// Edit an entry's text.
pub async fn edit_entry<P, E>(
    coordinator: &SchedulingCoordinator<P, E>,
    req: EditRequest,
) -> Result<Entry, ErrorResponse>
where
    P: PostingSurface,
    E: EntryStore,
{
    Ok(coordinator.edit_text(req.entry_id, &req.text).await?)
}

/// Move an entry one place earlier or later.
pub async fn swap_entry<P, E>(
    coordinator: &SchedulingCoordinator<P, E>,
    req: SwapRequest,
) -> Result<(Entry, Entry), ErrorResponse>
where
    P: PostingSurface,
    E: EntryStore,
{
    Ok(coordinator.swap(req.entry_id, req.direction).await?)
}
