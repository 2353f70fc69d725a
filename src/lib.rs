//! # Post Scheduler
//!
//! Collision-free publication calendar and sequential post numbering for
//! posts that are scheduled on an external platform.
//!
//! Content is submitted, reviewed by a human, and on approval placed into the
//! next free posting window while carrying a visible `#N` label. The
//! platform holding the scheduled posts is the source of truth for which
//! slots are taken; every allocation is re-verified against it before a post
//! is created.
//!
//! ## Key Guarantees
//!
//! - **No double booking**: at most one post per posting window, even with
//!   concurrent approvals
//! - **Dense numbering**: scheduled and published posts are numbered
//!   `1..=N` without gaps, and withdrawals renumber the followers
//! - **Exclusion calendars**: weekends, holidays and explicit dates are never
//!   used
//! - **Explicit failure outcomes**: every error states whether nothing
//!   happened, the external write was compensated, or manual repair is due
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use post_scheduler::builders::CoordinatorBuilder;
//! use post_scheduler::config::ScheduleConfig;
//! use post_scheduler::infra::{InMemoryEntryStore, InMemorySurface};
//!
//! let coordinator = CoordinatorBuilder::new(
//!     Arc::new(InMemorySurface::new()),
//!     Arc::new(InMemoryEntryStore::new()),
//! )
//! .with_config(ScheduleConfig::default())
//! .build()
//! .await?;
//!
//! let entry = coordinator.submit("Morning update").await?;
//! let outcome = coordinator.approve(entry.id, None).await?;
//! println!("#{} at {}", outcome.post_number, outcome.slot);
//! ```
//!
//! For complete scenarios, see `tests/coordinator_test.rs` and
//! `tests/reconcile_test.rs`.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: entries, slots, numbering and coordination.
pub mod core;
/// Configuration models for windows, exclusions, retries and timeouts.
pub mod config;
/// Builders to construct the coordinator from configuration.
pub mod builders;
/// Infrastructure adapters for posting surfaces, entry stores and calendars.
pub mod infra;
/// Runtime adapters: reconcile worker and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
