//! Fan-out of notifications to workspace hosts.
//!
//! [`NotificationDispatcher`] keeps hosts in registration order, each with
//! its own readiness flag and the set of projects already announced to it.
//! Hosts that are not ready are skipped; they catch up once, when marked
//! ready, by replaying the interactive project set.
//!
//! Delivery runs under `&mut self` and hosts receive `&HostNotification`,
//! so a host cannot re-enter the dispatch loop during a delivery pass.

use std::sync::Arc;

use pt_core::{FxHashSet, Project, ProjectId};
use tracing::{debug, trace};

use crate::error::TrackerError;
use crate::host::{HostNotification, WorkspaceHost};
use crate::stats::TrackerStats;

#[derive(Debug)]
struct HostEntry {
    host: Arc<dyn WorkspaceHost>,
    ready: bool,
    pushed: FxHashSet<ProjectId>,
}

impl HostEntry {
    fn deliver(&self, notification: &HostNotification, stats: &TrackerStats) {
        trace!(kind = notification.kind(), "Delivering notification");
        self.host.notify(notification);
        stats.increment_notifications();
    }

    /// Announces `projects` not yet known to this host, then starts them.
    fn push(&mut self, projects: &[Project], stats: &TrackerStats) {
        let mut started = Vec::with_capacity(projects.len());
        for project in projects {
            if self.pushed.insert(project.id) {
                self.deliver(
                    &HostNotification::ProjectAdded(Box::new(project.clone())),
                    stats,
                );
                started.push(project.id);
            }
        }
        if !started.is_empty() {
            self.deliver(&HostNotification::StartPushing(started), stats);
        }
    }
}

/// Ordered, readiness-gated delivery to workspace hosts.
#[derive(Debug)]
pub struct NotificationDispatcher {
    hosts: Vec<HostEntry>,
    stats: Arc<TrackerStats>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with no hosts.
    #[must_use]
    pub fn new(stats: Arc<TrackerStats>) -> Self {
        Self {
            hosts: Vec::new(),
            stats,
        }
    }

    /// Returns the number of registered hosts.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Returns `true` if no host is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Returns `true` if `host` is registered and ready.
    #[must_use]
    pub fn is_ready(&self, host: &Arc<dyn WorkspaceHost>) -> bool {
        self.position(host)
            .is_some_and(|index| self.hosts[index].ready)
    }

    /// Registers a host. It receives nothing until marked ready.
    pub fn register(&mut self, host: Arc<dyn WorkspaceHost>) -> Result<(), TrackerError> {
        if self.position(&host).is_some() {
            return Err(TrackerError::HostAlreadyRegistered);
        }
        self.hosts.push(HostEntry {
            host,
            ready: false,
            pushed: FxHashSet::default(),
        });
        debug!(hosts = self.hosts.len(), "Registered workspace host");
        Ok(())
    }

    /// Marks a host ready, replaying `interactive` to it first.
    ///
    /// Returns `false` if the host was already ready, in which case nothing
    /// is delivered.
    pub fn mark_ready(
        &mut self,
        host: &Arc<dyn WorkspaceHost>,
        interactive: &[Project],
    ) -> Result<bool, TrackerError> {
        let index = self.position(host).ok_or(TrackerError::HostNotRegistered)?;
        let stats = &self.stats;
        let entry = &mut self.hosts[index];
        if entry.ready {
            return Ok(false);
        }

        entry.push(interactive, stats);
        entry.ready = true;
        debug!(replayed = interactive.len(), "Workspace host ready");
        Ok(true)
    }

    /// Delivers `notification` to every ready host in registration order.
    pub fn broadcast(&self, notification: &HostNotification) {
        for entry in self.hosts.iter().filter(|entry| entry.ready) {
            entry.deliver(notification, &self.stats);
        }
    }

    /// Announces and starts `projects` on every ready host.
    ///
    /// `projects` must already be in dependency order.
    pub fn start_pushing(&mut self, projects: &[Project]) {
        let stats = &self.stats;
        for entry in self.hosts.iter_mut().filter(|entry| entry.ready) {
            entry.push(projects, stats);
        }
    }

    /// Stops `ids` on every ready host.
    pub fn stop_pushing(&self, ids: &[ProjectId]) {
        if ids.is_empty() {
            return;
        }
        self.broadcast(&HostNotification::StopPushing(ids.to_vec()));
    }

    /// Forgets a removed project, notifying ready hosts if it was pushing.
    pub fn project_removed(&mut self, id: ProjectId, was_pushing: bool) {
        let stats = &self.stats;
        for entry in &mut self.hosts {
            entry.pushed.remove(&id);
            if was_pushing && entry.ready {
                entry.deliver(&HostNotification::ProjectRemoved(id), stats);
            }
        }
    }

    /// Resets per-host state once the solution has closed.
    pub fn solution_closed(&mut self) {
        let stats = &self.stats;
        for entry in &mut self.hosts {
            entry.pushed.clear();
            if entry.ready {
                entry.deliver(&HostNotification::SolutionClosed, stats);
            }
        }
    }

    fn position(&self, host: &Arc<dyn WorkspaceHost>) -> Option<usize> {
        self.hosts
            .iter()
            .position(|entry| Arc::ptr_eq(&entry.host, host))
    }
}
