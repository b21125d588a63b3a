//! Core project model, errors, and configuration for the project tracker.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - [`Project`] and its identity ([`ProjectId`]), language and references
//! - [`OutputPathKey`], the case-insensitive key for output-binary paths
//! - [`DeferredProjectDescriptor`], the per-project bundle handed over by a
//!   deferred-load provider
//! - Configuration structures ([`Config`]) and [`ConfigError`]
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LoadConfig, TrackerConfig};
pub use error::ConfigError;
pub use types::{
    DeferredProjectDescriptor, DescriptorMap, Language, MetadataReference, OutputPathKey, Project,
    ProjectId, ProjectReference,
};

/// A [`HashMap`](std::collections::HashMap) using the Fx hash algorithm.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A [`HashSet`](std::collections::HashSet) using the Fx hash algorithm.
pub type FxHashSet<V> = rustc_hash::FxHashSet<V>;
