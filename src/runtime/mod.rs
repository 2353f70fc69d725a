//! Runtime adapters: background workers and the API surface.

pub mod api;
pub mod reconciler;

pub use api::{
    approve_entry, edit_entry, submit_entry, swap_entry, unschedule_entry, ApproveRequest,
    EditRequest, ErrorResponse, SubmitRequest, SwapRequest,
};
pub use reconciler::ReconcileWorker;
