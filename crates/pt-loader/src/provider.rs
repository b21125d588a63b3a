//! Deferred descriptor providers.
//!
//! A [`DescriptorProvider`] answers the one slow question of a deferred
//! load: which projects exist in the active build configuration and how
//! each of them is compiled. [`ManifestProvider`] answers it from a JSON
//! [`SolutionManifest`].

use std::collections::BTreeMap;
use std::future::Future;

use camino::{Utf8Path, Utf8PathBuf};
use pt_core::{DeferredProjectDescriptor, DescriptorMap};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::command_line::resolve_path;
use crate::error::ProviderError;

/// Source of deferred project descriptors.
pub trait DescriptorProvider {
    /// Returns a descriptor for every project in `configuration`.
    ///
    /// `configuration` is a key such as `Debug|Any CPU`. Implementations may
    /// take arbitrarily long and should return [`ProviderError::Cancelled`]
    /// once `cancel` fires.
    fn project_descriptors(
        &self,
        configuration: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<DescriptorMap, ProviderError>> + Send;

    /// Returns the GUID the host assigned to `project_file`.
    fn project_guid(&self, project_file: &Utf8Path) -> Result<Uuid, ProviderError>;
}

/// A solution described on disk.
///
/// Relative paths inside the manifest are relative to the manifest file.
///
/// ```json
/// {
///   "solution": "App.sln",
///   "working_folder": ".",
///   "configurations": {
///     "Debug|Any CPU": {
///       "src/App/App.csproj": {
///         "CommandLineArguments": ["/out:bin/App.dll", "Program.cs"],
///         "TargetPath": "src/App/bin/App.dll",
///         "ReferencedProjectFilePaths": ["src/Core/Core.csproj"]
///       }
///     }
///   },
///   "guids": { "src/App/App.csproj": "5f1c0e1a-4a53-4a7e-9d7c-0b5c9f6c6b11" }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolutionManifest {
    /// Solution file.
    pub solution: Utf8PathBuf,

    /// Working folder for relative command-line paths.
    pub working_folder: Option<Utf8PathBuf>,

    /// Descriptors per build-configuration key.
    pub configurations: BTreeMap<String, DescriptorMap>,

    /// Project GUIDs by project file.
    pub guids: BTreeMap<Utf8PathBuf, Uuid>,
}

impl SolutionManifest {
    /// Reads a manifest and resolves its paths against the manifest's
    /// directory.
    pub async fn load(path: &Utf8Path) -> Result<Self, ProviderError> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|err| ProviderError::io(path, err))?
        {
            return Err(ProviderError::ManifestNotFound(path.to_owned()));
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|err| ProviderError::io(path, err))?;
        let manifest: Self =
            serde_json::from_str(&contents).map_err(|err| ProviderError::parse(path, err))?;

        let base = path.parent().unwrap_or_else(|| Utf8Path::new(""));
        debug!(manifest = %path, configurations = manifest.configurations.len(), "Loaded solution manifest");
        Ok(manifest.rebased(base))
    }

    /// Returns a copy with every relative path resolved against `base`.
    #[must_use]
    pub fn rebased(self, base: &Utf8Path) -> Self {
        let resolve = |path: &Utf8Path| resolve_path(base, path.as_str());

        let configurations = self
            .configurations
            .into_iter()
            .map(|(key, descriptors)| {
                let descriptors = descriptors
                    .into_iter()
                    .map(|(file, descriptor)| {
                        let descriptor = DeferredProjectDescriptor {
                            command_line_arguments: descriptor.command_line_arguments,
                            target_path: descriptor.target_path.map(|target| {
                                if target.as_str().is_empty() {
                                    target
                                } else {
                                    resolve(target.as_path())
                                }
                            }),
                            referenced_project_file_paths: descriptor
                                .referenced_project_file_paths
                                .iter()
                                .map(|reference| resolve(reference.as_path()))
                                .collect(),
                        };
                        (resolve(file.as_path()), descriptor)
                    })
                    .collect();
                (key, descriptors)
            })
            .collect();

        Self {
            solution: resolve(self.solution.as_path()),
            working_folder: self.working_folder.as_deref().map(resolve),
            configurations,
            guids: self
                .guids
                .into_iter()
                .map(|(file, guid)| (resolve(file.as_path()), guid))
                .collect(),
        }
    }
}

/// Serves descriptors from a [`SolutionManifest`].
#[derive(Debug, Clone, Default)]
pub struct ManifestProvider {
    manifest: SolutionManifest,
}

impl ManifestProvider {
    /// Wraps an already loaded manifest.
    #[must_use]
    pub const fn new(manifest: SolutionManifest) -> Self {
        Self { manifest }
    }

    /// Loads the manifest at `path`.
    pub async fn from_file(path: &Utf8Path) -> Result<Self, ProviderError> {
        Ok(Self::new(SolutionManifest::load(path).await?))
    }

    /// Returns the underlying manifest.
    #[inline]
    #[must_use]
    pub const fn manifest(&self) -> &SolutionManifest {
        &self.manifest
    }
}

impl DescriptorProvider for ManifestProvider {
    async fn project_descriptors(
        &self,
        configuration: &str,
        cancel: &CancellationToken,
    ) -> Result<DescriptorMap, ProviderError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ProviderError::Cancelled),
            () = tokio::task::yield_now() => Ok(self
                .manifest
                .configurations
                .get(configuration)
                .cloned()
                .unwrap_or_default()),
        }
    }

    fn project_guid(&self, project_file: &Utf8Path) -> Result<Uuid, ProviderError> {
        self.manifest
            .guids
            .get(project_file)
            .copied()
            .ok_or_else(|| ProviderError::GuidUnavailable(project_file.to_owned()))
    }
}
