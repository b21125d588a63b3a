//! Domain types for the project tracker.
//!
//! # Module Organization
//!
//! - [`project`] - Project identity, language and the project record itself
//! - [`reference`] - Outgoing references (binary/metadata or direct project)
//! - [`path`] - Case-insensitive output-path keys
//! - [`descriptor`] - Deferred-load project descriptors
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use pt_core::{Project, ProjectId, ProjectReference, OutputPathKey};
//! ```

mod descriptor;
mod path;
mod project;
mod reference;

pub use descriptor::{DeferredProjectDescriptor, DescriptorMap};
pub use path::OutputPathKey;
pub use project::{Language, Project, ProjectId};
pub use reference::{MetadataReference, ProjectReference};
