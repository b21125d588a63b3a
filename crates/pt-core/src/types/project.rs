//! Project records tracked by the registry.
//!
//! A [`Project`] is a compilation unit: a display name, an optional project
//! file, a language, an optional output binary and a list of outgoing
//! references. Projects are built up front and handed to the tracker, which
//! then owns them exclusively.

use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use super::path::OutputPathKey;
use super::reference::{MetadataReference, ProjectReference};

/// An opaque identifier for a tracked project.
///
/// Identities are handed out by the registry and are stable only within a
/// solution session.
///
/// # Examples
///
/// ```
/// use pt_core::ProjectId;
///
/// let id = ProjectId::new(7);
/// assert_eq!(id.as_u64(), 7);
/// assert_eq!(id.to_string(), "#7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub u64);

impl ProjectId {
    /// Creates a new project ID from a u64 value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the inner u64 value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Source language of a project.
///
/// Only languages whose project files can be recognized from their
/// extension are representable; anything else is skipped by the loader.
///
/// # Examples
///
/// ```
/// use pt_core::Language;
/// use camino::Utf8Path;
///
/// assert_eq!(Language::from_project_file(Utf8Path::new("src/App.csproj")), Some(Language::CSharp));
/// assert_eq!(Language::from_project_file(Utf8Path::new("web/site.njsproj")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Language {
    /// C# (`.csproj`).
    CSharp,
    /// Visual Basic (`.vbproj`).
    VisualBasic,
}

impl Language {
    /// Determines the language from a project file's extension.
    #[must_use]
    pub fn from_project_file(path: &Utf8Path) -> Option<Self> {
        let extension = path.extension()?;
        if extension.eq_ignore_ascii_case("csproj") {
            Some(Self::CSharp)
        } else if extension.eq_ignore_ascii_case("vbproj") {
            Some(Self::VisualBasic)
        } else {
            None
        }
    }

    /// Returns the display name of the language.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CSharp => "C#",
            Self::VisualBasic => "Visual Basic",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tracked project.
///
/// # Examples
///
/// ```
/// use pt_core::{Language, Project, ProjectId, ProjectReference};
///
/// let project = Project::new(ProjectId::new(1), "Core", Language::CSharp)
///     .with_bin_output_path("out/Core.dll")
///     .with_reference(ProjectReference::binary("lib/Json.dll"));
///
/// assert_eq!(project.references.len(), 1);
/// assert!(!project.pushing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier for this project.
    pub id: ProjectId,

    /// Display name shown to consumers.
    pub display_name: String,

    /// Project file, when known. It may not exist on disk.
    pub file_path: Option<Utf8PathBuf>,

    /// Source language.
    pub language: Language,

    /// Project GUID reported by the host, or a synthetic one.
    pub guid: Uuid,

    /// Output binary, if the project produces one.
    ///
    /// Changed through the tracker once registered so the output-path index
    /// stays consistent.
    pub bin_output_path: Option<Utf8PathBuf>,

    /// Whether the project is interactive (pushing changes to hosts).
    pub pushing: bool,

    /// Outgoing references.
    pub references: SmallVec<[ProjectReference; 4]>,

    /// Source files compiled by the project.
    pub source_files: Vec<Utf8PathBuf>,

    /// Additional (non-source) files passed to analyzers.
    pub additional_files: Vec<Utf8PathBuf>,

    /// Analyzer assemblies.
    pub analyzer_references: Vec<Utf8PathBuf>,

    /// Raw compiler options the project was created from.
    pub options: String,
}

impl Project {
    /// Creates a project with no file, output path or references.
    #[must_use]
    pub fn new(id: ProjectId, display_name: impl Into<String>, language: Language) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            file_path: None,
            language,
            guid: Uuid::nil(),
            bin_output_path: None,
            pushing: false,
            references: SmallVec::new(),
            source_files: Vec::new(),
            additional_files: Vec::new(),
            analyzer_references: Vec::new(),
            options: String::new(),
        }
    }

    /// Sets the project file.
    #[must_use]
    pub fn with_file_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Sets the output binary.
    #[must_use]
    pub fn with_bin_output_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.bin_output_path = Some(path.into());
        self
    }

    /// Appends an outgoing reference.
    #[must_use]
    pub fn with_reference(mut self, reference: ProjectReference) -> Self {
        self.references.push(reference);
        self
    }

    /// Returns the key of the output binary, if any.
    #[must_use]
    pub fn output_key(&self) -> Option<OutputPathKey> {
        self.bin_output_path.as_deref().map(OutputPathKey::new)
    }

    /// Returns the projects this project references directly.
    pub fn project_references(&self) -> impl Iterator<Item = ProjectId> + '_ {
        self.references.iter().filter_map(ProjectReference::project)
    }

    /// Returns the binary references that have not been promoted.
    pub fn metadata_references(&self) -> impl Iterator<Item = &MetadataReference> + '_ {
        self.references.iter().filter_map(|reference| match reference {
            ProjectReference::Metadata(metadata) => Some(metadata),
            ProjectReference::Project { .. } => None,
        })
    }

    /// Returns `true` if this project references `other` directly.
    #[must_use]
    pub fn references_project(&self, other: ProjectId) -> bool {
        self.project_references().any(|id| id == other)
    }

    /// Promotes binary references to `key` into a direct reference to `producer`.
    ///
    /// Nothing happens when this project is the producer itself or already
    /// references it directly. Returns `true` if a reference changed.
    pub fn try_convert_to_project_reference(
        &mut self,
        key: &OutputPathKey,
        producer: ProjectId,
    ) -> bool {
        if producer == self.id || self.references_project(producer) {
            return false;
        }

        let Some(slot) = self.references.iter_mut().find(|reference| {
            matches!(reference, ProjectReference::Metadata(metadata) if metadata.key() == *key)
        }) else {
            return false;
        };

        if let ProjectReference::Metadata(metadata) = slot {
            let original = metadata.clone();
            *slot = ProjectReference::Project {
                project: producer,
                converted_from: Some(original),
            };
            return true;
        }
        false
    }

    /// Reverts every direct reference that was promoted from `key`.
    ///
    /// Declared project references are left alone. Returns `true` if a
    /// reference changed.
    pub fn undo_project_reference_conversion(&mut self, key: &OutputPathKey) -> bool {
        let mut changed = false;
        for reference in &mut self.references {
            let original = match reference {
                ProjectReference::Project {
                    converted_from: Some(original),
                    ..
                } if original.key() == *key => original.clone(),
                _ => continue,
            };
            *reference = ProjectReference::Metadata(original);
            changed = true;
        }
        changed
    }
}
