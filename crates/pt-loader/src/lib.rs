//! Deferred solution loading.
//!
//! Instead of evaluating every project file up front, a host can describe
//! the projects of a build configuration as [`DeferredProjectDescriptor`]s
//! (compiler command line, output binary, project-to-project references).
//! This crate turns those descriptors into registered projects.
//!
//! # Overview
//!
//! - [`DescriptorProvider`]: source of descriptors, e.g. [`ManifestProvider`]
//! - [`CommandLineParser`]: compiler arguments to [`ParsedCommandLine`]
//! - [`DeferredLoadOrchestrator`]: the load state machine
//!
//! # Architecture
//!
//! ```text
//! DescriptorProvider ──(async, cancellable)──> DescriptorMap
//!                                                  │
//!                         rayon ── CommandLineParser (per descriptor)
//!                                                  │
//!                      depth-first materialization (foreground)
//!                                                  │
//!                                   ProjectTracker::add_project
//!                                                  │
//!                                   ProjectTracker::finish_load
//! ```
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use pt_core::{LoadConfig, TrackerConfig};
//! use pt_loader::{DeferredLoadOrchestrator, ManifestProvider};
//! use pt_tracker::ProjectTracker;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = ManifestProvider::from_file(Utf8Path::new("solution.json")).await?;
//! let mut tracker = ProjectTracker::new(TrackerConfig::default());
//! let mut loader = DeferredLoadOrchestrator::new(provider, LoadConfig::default());
//!
//! let summary = loader.load(&mut tracker).await?;
//! tracing::info!(projects = summary.created.len(), "Loaded");
//! # Ok(())
//! # }
//! ```
//!
//! [`DeferredProjectDescriptor`]: pt_core::DeferredProjectDescriptor

#![deny(clippy::all)]
#![warn(missing_docs)]

mod command_line;
mod error;
mod orchestrator;
mod provider;

pub use command_line::{resolve_path, CommandLineParser, CscStyleParser, ParsedCommandLine};
pub use error::{LoadError, ProviderError};
pub use orchestrator::{
    AnalyzerDependencyCheck, DanglingReference, DeferredLoadOrchestrator, LoadState, LoadSummary,
};
pub use provider::{DescriptorProvider, ManifestProvider, SolutionManifest};
