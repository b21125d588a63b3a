//! Error types for the pt-tracker crate.
//!
//! This module provides the [`TrackerError`] type for violations of the
//! tracker's bookkeeping contract.

use pt_core::ProjectId;

/// Errors reported by the project tracker.
///
/// # Error Recovery Strategy
///
/// Almost every variant is an internal-consistency violation: a collaborator
/// broke the registration contract and the tracker's view can no longer be
/// trusted. Those are fatal and must not be swallowed.
///
/// - **Duplicate project** ([`TrackerError::ProjectAlreadyRegistered`]): Fatal
/// - **Unknown project** ([`TrackerError::ProjectNotRegistered`]): Fatal
/// - **Duplicate host** ([`TrackerError::HostAlreadyRegistered`]): Fatal
/// - **Registry not empty after close** ([`TrackerError::RegistryNotEmpty`]): Fatal
/// - **Unknown host** ([`TrackerError::HostNotRegistered`]): Recoverable, nothing changed
///
/// # Examples
///
/// ```
/// use pt_tracker::TrackerError;
/// use pt_core::ProjectId;
///
/// let err = TrackerError::ProjectNotRegistered(ProjectId::new(4));
/// assert!(err.is_fatal());
/// assert_eq!(err.project(), Some(ProjectId::new(4)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// A project with this identity is already registered.
    #[error("project {0} is already registered")]
    ProjectAlreadyRegistered(ProjectId),

    /// No project with this identity is registered.
    #[error("project {0} is not registered")]
    ProjectNotRegistered(ProjectId),

    /// The same workspace host instance was registered twice.
    #[error("workspace host is already registered")]
    HostAlreadyRegistered,

    /// The workspace host was never registered.
    #[error("workspace host is not registered")]
    HostNotRegistered,

    /// Projects were still registered once the solution finished closing.
    #[error("{remaining} project(s) still registered after the solution closed")]
    RegistryNotEmpty {
        /// Number of projects left behind.
        remaining: usize,
    },
}

impl TrackerError {
    /// Returns `true` if this error signals a broken tracker contract.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns `true` if the tracker state is unaffected by this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::HostNotRegistered)
    }

    /// Returns the project associated with this error, if any.
    #[must_use]
    pub const fn project(&self) -> Option<ProjectId> {
        match self {
            Self::ProjectAlreadyRegistered(id) | Self::ProjectNotRegistered(id) => Some(*id),
            Self::HostAlreadyRegistered
            | Self::HostNotRegistered
            | Self::RegistryNotEmpty { .. } => None,
        }
    }
}
