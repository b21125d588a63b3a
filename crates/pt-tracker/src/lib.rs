//! Project registry and workspace notification engine.
//!
//! This crate keeps a consistent view of the projects in an open solution
//! and propagates changes to downstream workspace hosts.
//!
//! # Overview
//!
//! The main entry point is [`ProjectTracker`], which combines:
//!
//! - [`ProjectRegistry`]: identity to project state, the single source of truth
//! - [`OutputPathIndex`]: output binary to producing projects, inside [`SharedIndices`]
//! - [`NotificationDispatcher`]: ordered, readiness-gated fan-out to [`WorkspaceHost`]s
//! - [`SolutionSession`]: load-batch window, closing flag and cancellation token
//! - [`TrackerStats`]: atomic counters for reporting
//!
//! # Architecture
//!
//! ```text
//! ProjectTracker (foreground only)
//!     │
//!     ├── ProjectRegistry
//!     │       │
//!     │       └── SharedIndices (Arc + parking_lot::Mutex, any thread)
//!     │               ├── identity map (path + name -> ProjectId)
//!     │               └── OutputPathIndex -> ReconcileAction
//!     │
//!     ├── NotificationDispatcher -> WorkspaceHost (registration order)
//!     │
//!     └── SolutionSession + WorkingFolders
//! ```
//!
//! # Reference promotion
//!
//! A binary reference to `out/a.dll` becomes a direct reference to the
//! project that builds `out/a.dll`, but only while exactly one registered
//! project produces it. A second producer demotes it again; removing the
//! second producer promotes it back.

#![deny(clippy::all)]
#![warn(missing_docs)]

mod context;
mod dispatcher;
mod error;
mod host;
mod index;
mod registry;
mod session;
mod shared;
mod stats;
mod tracker;

pub use context::ForegroundContext;
pub use dispatcher::NotificationDispatcher;
pub use error::TrackerError;
pub use host::{HostNotification, RecordingHost, TracingHost, WorkspaceHost};
pub use index::{OutputPathIndex, ReconcileAction, ReconcileActions};
pub use registry::{ProjectRegistry, Reconciliation};
pub use session::{SolutionSession, WorkingFolders};
pub use shared::SharedIndices;
pub use stats::{StatsSnapshot, TrackerStats};
pub use tracker::ProjectTracker;
