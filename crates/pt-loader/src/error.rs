//! Error types for the pt-loader crate.
//!
//! - [`ProviderError`] - failures of a descriptor provider
//! - [`LoadError`] - outcome of a deferred load that did not complete

use camino::Utf8PathBuf;
use pt_tracker::TrackerError;

/// Errors reported by a [`DescriptorProvider`](crate::DescriptorProvider).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The solution manifest does not exist.
    #[error("manifest not found: {0}")]
    ManifestNotFound(Utf8PathBuf),

    /// The solution manifest could not be read.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The solution manifest is not valid JSON for the expected schema.
    #[error("invalid manifest {path}: {source}")]
    Parse {
        /// The manifest path.
        path: Utf8PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The provider has no GUID for this project file.
    #[error("no project guid recorded for {0}")]
    GuidUnavailable(Utf8PathBuf),

    /// The request was abandoned because its cancellation token fired.
    #[error("descriptor request cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Creates a new [`ProviderError::Io`] error.
    #[inline]
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a new [`ProviderError::Parse`] error.
    #[inline]
    pub fn parse(path: impl Into<Utf8PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }

    /// Returns the path associated with this error, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Utf8PathBuf> {
        match self {
            Self::ManifestNotFound(path)
            | Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::GuidUnavailable(path) => Some(path),
            Self::Cancelled => None,
        }
    }
}

/// Errors that end a deferred load early.
///
/// # Error Recovery Strategy
///
/// - **Disabled** ([`LoadError::Disabled`]): Recoverable, the host loads projects itself
/// - **Cancelled** ([`LoadError::Cancelled`]): Recoverable, the solution is closing
/// - **Provider** ([`LoadError::Provider`]): Fatal for this load, nothing was registered
/// - **Thread pool** ([`LoadError::ThreadPool`]): Fatal for this load, nothing was registered
/// - **Tracker** ([`LoadError::Tracker`]): Fatal, the tracker contract was broken
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Deferred loading is turned off in the tracker configuration.
    #[error("deferred project loading is disabled")]
    Disabled,

    /// The solution session was cancelled while descriptors were requested.
    #[error("deferred load cancelled")]
    Cancelled,

    /// The descriptor provider failed.
    #[error("descriptor provider failed: {0}")]
    Provider(ProviderError),

    /// The command-line parsing pool could not be created.
    #[error("failed to build parser thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The tracker rejected a registration.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl From<ProviderError> for LoadError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => Self::Cancelled,
            other => Self::Provider(other),
        }
    }
}

impl LoadError {
    /// Returns `true` if the load ended because of cancellation.
    #[inline]
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns `true` if the caller can carry on without this load.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Disabled | Self::Cancelled)
    }

    /// Returns `true` if the error signals a broken tracker contract.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Tracker(err) => err.is_fatal(),
            Self::Disabled | Self::Cancelled | Self::Provider(_) | Self::ThreadPool(_) => false,
        }
    }
}
