//! Outgoing project references.
//!
//! A project refers to its dependencies either through a compiled binary on
//! disk ([`ProjectReference::Metadata`]) or directly to another tracked
//! project ([`ProjectReference::Project`]). A binary reference may be promoted
//! to a direct one while exactly one tracked project produces that binary;
//! the original binary reference is kept so the promotion can be undone.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::path::OutputPathKey;
use super::project::ProjectId;

/// A reference to a compiled binary (metadata) on disk.
///
/// # Examples
///
/// ```
/// use pt_core::MetadataReference;
///
/// let reference = MetadataReference::new("lib/Newtonsoft.Json.dll");
/// assert!(reference.aliases.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataReference {
    /// Path of the referenced binary.
    pub path: Utf8PathBuf,

    /// Extern aliases attached to the reference (`/reference:Alias=path`).
    pub aliases: SmallVec<[String; 1]>,
}

impl MetadataReference {
    /// Creates a metadata reference without aliases.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            aliases: SmallVec::new(),
        }
    }

    /// Returns the case-insensitive key of the referenced path.
    #[must_use]
    pub fn key(&self) -> OutputPathKey {
        OutputPathKey::new(&self.path)
    }
}

/// An outgoing reference from one project to a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProjectReference {
    /// A raw binary reference.
    Metadata(MetadataReference),

    /// A direct project-to-project reference.
    Project {
        /// The referenced project.
        project: ProjectId,

        /// The binary reference this was promoted from, if any.
        ///
        /// `None` for references that were declared as project references.
        converted_from: Option<MetadataReference>,
    },
}

impl ProjectReference {
    /// Creates a declared (non-converted) project reference.
    #[inline]
    #[must_use]
    pub const fn direct(project: ProjectId) -> Self {
        Self::Project {
            project,
            converted_from: None,
        }
    }

    /// Creates a binary reference to `path`.
    #[must_use]
    pub fn binary(path: impl Into<Utf8PathBuf>) -> Self {
        Self::Metadata(MetadataReference::new(path))
    }

    /// Returns the referenced project, for direct references.
    #[inline]
    #[must_use]
    pub const fn project(&self) -> Option<ProjectId> {
        match self {
            Self::Project { project, .. } => Some(*project),
            Self::Metadata(_) => None,
        }
    }

    /// Returns the binary path, for metadata references.
    #[must_use]
    pub fn metadata_path(&self) -> Option<&Utf8Path> {
        match self {
            Self::Metadata(reference) => Some(&reference.path),
            Self::Project { .. } => None,
        }
    }

    /// Returns `true` if this is a direct reference promoted from a binary.
    #[inline]
    #[must_use]
    pub const fn is_converted(&self) -> bool {
        matches!(
            self,
            Self::Project {
                converted_from: Some(_),
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_accessors() {
        let metadata = ProjectReference::binary("out/a.dll");
        assert_eq!(metadata.metadata_path(), Some(Utf8Path::new("out/a.dll")));
        assert_eq!(metadata.project(), None);
        assert!(!metadata.is_converted());

        let direct = ProjectReference::direct(ProjectId::new(3));
        assert_eq!(direct.project(), Some(ProjectId::new(3)));
        assert!(direct.metadata_path().is_none());
        assert!(!direct.is_converted());
    }

    #[test]
    fn test_converted_reference() {
        let reference = ProjectReference::Project {
            project: ProjectId::new(1),
            converted_from: Some(MetadataReference::new("out/a.dll")),
        };
        assert!(reference.is_converted());
    }

    #[test]
    fn test_reference_serialization_tag() {
        let json = serde_json::to_string(&ProjectReference::direct(ProjectId::new(2))).unwrap();
        assert!(json.contains(r#""kind":"project""#));
    }
}
