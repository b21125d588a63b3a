//! Workspace host contract.
//!
//! A workspace host is a downstream consumer of project changes. Hosts are
//! registered with the tracker, stay silent until marked ready, and then
//! receive [`HostNotification`]s in registration order on the foreground
//! context. A host only ever sees a shared reference to the notification,
//! so it cannot call back into the tracker while a delivery is running.

use std::fmt;

use parking_lot::Mutex;
use pt_core::{Project, ProjectId};
use tracing::info;

/// A change pushed to workspace hosts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostNotification {
    /// A project became known to the host. Always precedes `StartPushing`
    /// for the same project.
    ProjectAdded(Box<Project>),

    /// A pushing project was removed.
    ProjectRemoved(ProjectId),

    /// The projects start pushing changes, dependencies first.
    StartPushing(Vec<ProjectId>),

    /// The projects stop pushing changes.
    StopPushing(Vec<ProjectId>),

    /// A pushing project's references were promoted or demoted.
    ReferencesChanged(Box<Project>),

    /// The solution was removed from the workspace.
    SolutionRemoved,

    /// The host should drop all solution state.
    ClearSolution,

    /// The solution finished closing.
    SolutionClosed,
}

impl HostNotification {
    /// Returns a short name for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ProjectAdded(_) => "project_added",
            Self::ProjectRemoved(_) => "project_removed",
            Self::StartPushing(_) => "start_pushing",
            Self::StopPushing(_) => "stop_pushing",
            Self::ReferencesChanged(_) => "references_changed",
            Self::SolutionRemoved => "solution_removed",
            Self::ClearSolution => "clear_solution",
            Self::SolutionClosed => "solution_closed",
        }
    }
}

/// A consumer of tracker notifications.
///
/// Hosts are identified by the `Arc` they were registered with; registering
/// the same `Arc` twice is an error.
pub trait WorkspaceHost: Send + Sync + fmt::Debug {
    /// Receives one notification.
    fn notify(&self, notification: &HostNotification);
}

/// A host that logs every notification.
#[derive(Debug, Clone)]
pub struct TracingHost {
    name: String,
}

impl TracingHost {
    /// Creates a logging host with the given display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl WorkspaceHost for TracingHost {
    fn notify(&self, notification: &HostNotification) {
        match notification {
            HostNotification::ProjectAdded(project) => info!(
                host = %self.name,
                project = %project.id,
                name = %project.display_name,
                references = project.references.len(),
                "Project added"
            ),
            HostNotification::ProjectRemoved(id) => {
                info!(host = %self.name, project = %id, "Project removed");
            }
            HostNotification::StartPushing(ids) | HostNotification::StopPushing(ids) => {
                info!(host = %self.name, kind = notification.kind(), count = ids.len(), "Pushing state changed");
            }
            HostNotification::ReferencesChanged(project) => {
                info!(host = %self.name, project = %project.id, "References changed");
            }
            HostNotification::SolutionRemoved
            | HostNotification::ClearSolution
            | HostNotification::SolutionClosed => {
                info!(host = %self.name, kind = notification.kind(), "Solution event");
            }
        }
    }
}

/// A host that keeps every notification it receives.
///
/// # Examples
///
/// ```
/// use pt_tracker::{HostNotification, RecordingHost, WorkspaceHost};
///
/// let host = RecordingHost::default();
/// host.notify(&HostNotification::SolutionClosed);
/// assert_eq!(host.kinds(), vec!["solution_closed"]);
/// ```
#[derive(Debug, Default)]
pub struct RecordingHost {
    received: Mutex<Vec<HostNotification>>,
}

impl RecordingHost {
    /// Returns a copy of everything received so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<HostNotification> {
        self.received.lock().clone()
    }

    /// Returns the kind of every notification received so far.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        self.received
            .lock()
            .iter()
            .map(HostNotification::kind)
            .collect()
    }

    /// Returns the projects announced through `ProjectAdded`, in order.
    #[must_use]
    pub fn added_projects(&self) -> Vec<ProjectId> {
        self.received
            .lock()
            .iter()
            .filter_map(|notification| match notification {
                HostNotification::ProjectAdded(project) => Some(project.id),
                _ => None,
            })
            .collect()
    }

    /// Drains the notifications received so far.
    pub fn take(&self) -> Vec<HostNotification> {
        std::mem::take(&mut *self.received.lock())
    }
}

impl WorkspaceHost for RecordingHost {
    fn notify(&self, notification: &HostNotification) {
        self.received.lock().push(notification.clone());
    }
}
