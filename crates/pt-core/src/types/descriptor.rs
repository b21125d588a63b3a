//! Deferred-load project descriptors.
//!
//! A descriptor provider hands back one [`DeferredProjectDescriptor`] per
//! project file in the active solution configuration. Field names follow
//! the provider contract (`CommandLineArguments`, `TargetPath`,
//! `ReferencedProjectFilePaths`).

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Mapping from project file path to its descriptor.
///
/// Ordered so that materialization order, and therefore identity
/// assignment, is reproducible.
pub type DescriptorMap = BTreeMap<Utf8PathBuf, DeferredProjectDescriptor>;

/// Everything needed to construct a project without loading its project file.
///
/// # Examples
///
/// ```
/// use pt_core::DeferredProjectDescriptor;
///
/// let json = r#"{
///     "CommandLineArguments": ["/out:bin/App.dll", "Program.cs"],
///     "TargetPath": "bin/App.dll",
///     "ReferencedProjectFilePaths": ["../Core/Core.csproj"]
/// }"#;
/// let descriptor: DeferredProjectDescriptor = serde_json::from_str(json).unwrap();
/// assert_eq!(descriptor.target_path().map(|p| p.as_str()), Some("bin/App.dll"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DeferredProjectDescriptor {
    /// Compiler command-line arguments.
    pub command_line_arguments: Vec<String>,

    /// Output binary. Providers report an empty path when indexing failed.
    pub target_path: Option<Utf8PathBuf>,

    /// Project files referenced through project-to-project references.
    pub referenced_project_file_paths: Vec<Utf8PathBuf>,
}

impl DeferredProjectDescriptor {
    /// Returns the output binary, treating an empty path as absent.
    #[must_use]
    pub fn target_path(&self) -> Option<&Utf8PathBuf> {
        self.target_path
            .as_ref()
            .filter(|path| !path.as_str().is_empty())
    }
}
