//! The project tracker facade.
//!
//! [`ProjectTracker`] is the foreground entry point. It owns the registry,
//! the notification dispatcher and the solution session, and turns host
//! events into registry mutations followed by host notifications:
//!
//! ```text
//! host event -> ProjectRegistry -> OutputPathIndex -> reconciliation -> hosts
//! ```
//!
//! Every mutating operation asserts that it runs on the thread that created
//! the tracker and takes `&mut self`, so foreground operations never
//! interleave. Background work only sees [`SharedIndices`].
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use pt_core::{Language, Project, ProjectReference, TrackerConfig};
//! use pt_tracker::{ProjectTracker, RecordingHost, WorkspaceHost};
//!
//! let mut tracker = ProjectTracker::new(TrackerConfig::default());
//! let host: Arc<dyn WorkspaceHost> = Arc::new(RecordingHost::default());
//! tracker.register_host(Arc::clone(&host)).unwrap();
//! tracker.mark_host_ready(&host).unwrap();
//!
//! let a = tracker.shared().get_or_create_project_id_for_path("A.csproj", "A");
//! let b = tracker.shared().get_or_create_project_id_for_path("B.csproj", "B");
//! tracker.add_project(Project::new(a, "A", Language::CSharp).with_bin_output_path("out/a.dll")).unwrap();
//! tracker.add_project(
//!     Project::new(b, "B", Language::CSharp).with_reference(ProjectReference::binary("out/a.dll")),
//! ).unwrap();
//!
//! assert!(tracker.get_project(b).unwrap().references_project(a));
//! ```

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use pt_core::{Project, ProjectId, TrackerConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::context::ForegroundContext;
use crate::dispatcher::NotificationDispatcher;
use crate::error::TrackerError;
use crate::host::{HostNotification, WorkspaceHost};
use crate::registry::{ProjectRegistry, Reconciliation};
use crate::session::{SolutionSession, WorkingFolders};
use crate::shared::SharedIndices;
use crate::stats::{StatsSnapshot, TrackerStats};

/// Foreground owner of all project bookkeeping.
#[derive(Debug)]
pub struct ProjectTracker {
    config: TrackerConfig,
    context: ForegroundContext,
    registry: ProjectRegistry,
    dispatcher: NotificationDispatcher,
    session: SolutionSession,
    working_folders: WorkingFolders,
    stats: Arc<TrackerStats>,
}

impl ProjectTracker {
    /// Creates a tracker bound to the calling thread.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        let stats = Arc::new(TrackerStats::new());
        Self {
            config,
            context: ForegroundContext::current(),
            registry: ProjectRegistry::new(SharedIndices::new()),
            dispatcher: NotificationDispatcher::new(Arc::clone(&stats)),
            session: SolutionSession::new(),
            working_folders: WorkingFolders::new(),
            stats,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the tracker configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns the foreground context the tracker is bound to.
    #[inline]
    #[must_use]
    pub const fn context(&self) -> ForegroundContext {
        self.context
    }

    /// Returns the registry for read-only queries.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    /// Returns a handle to the indices that background work may use.
    #[must_use]
    pub fn shared(&self) -> SharedIndices {
        self.registry.shared().clone()
    }

    /// Returns the solution session state.
    #[inline]
    #[must_use]
    pub const fn session(&self) -> &SolutionSession {
        &self.session
    }

    /// Returns a snapshot of the tracker statistics.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Looks up a registered project.
    #[must_use]
    pub fn get_project(&self, id: ProjectId) -> Option<&Project> {
        self.registry.get(id)
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains_project(&self, id: ProjectId) -> bool {
        self.registry.contains(id)
    }

    /// Returns the cancellation token of the current solution session.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.session.cancellation_token()
    }

    // =========================================================================
    // Projects
    // =========================================================================

    /// Registers a project.
    ///
    /// Once the solution has finished loading the project starts pushing
    /// immediately; before that it joins the current load batch.
    pub fn add_project(&mut self, project: Project) -> Result<ProjectId, TrackerError> {
        self.context.assert_foreground();
        let id = project.id;
        let reconciliation = self.registry.insert(project)?;
        self.stats.increment_added();
        self.publish(&reconciliation);

        if self.session.is_load_complete() {
            self.start_pushing(&[id]);
        } else {
            self.session.record_loaded(id);
        }
        Ok(id)
    }

    /// Unregisters a project, returning it.
    pub fn remove_project(&mut self, id: ProjectId) -> Result<Project, TrackerError> {
        self.context.assert_foreground();
        let (project, reconciliation) = self.registry.remove(id)?;
        self.stats.increment_removed();
        self.session.forget(id);
        self.publish(&reconciliation);
        self.dispatcher.project_removed(id, project.pushing);
        Ok(project)
    }

    /// Changes a project's output binary and reconciles references.
    pub fn set_bin_output_path(
        &mut self,
        id: ProjectId,
        path: Option<Utf8PathBuf>,
    ) -> Result<(), TrackerError> {
        self.context.assert_foreground();
        let reconciliation = self.registry.set_bin_output_path(id, path)?;
        self.publish(&reconciliation);
        Ok(())
    }

    /// Starts pushing `ids` and any not-yet-pushing projects they reference.
    ///
    /// Ignored while the solution is closing.
    pub fn start_pushing(&mut self, ids: &[ProjectId]) {
        self.context.assert_foreground();
        if self.session.is_closing() {
            debug!(count = ids.len(), "Solution closing, not starting projects");
            return;
        }

        let order = self
            .registry
            .dependency_order(ids, |project| !project.pushing);
        if order.is_empty() {
            return;
        }
        for id in &order {
            self.registry.set_pushing(*id, true);
        }
        let projects = self.registry.snapshot(&order);
        self.dispatcher.start_pushing(&projects);
        debug!(count = order.len(), "Started pushing projects");
    }

    fn publish(&self, reconciliation: &Reconciliation) {
        if reconciliation.is_empty() {
            return;
        }
        self.stats.add_promoted(reconciliation.promoted().len());
        self.stats.add_demoted(reconciliation.demoted().len());

        for id in reconciliation.changed() {
            if let Some(project) = self.registry.get(id).filter(|project| project.pushing) {
                self.dispatcher
                    .broadcast(&HostNotification::ReferencesChanged(Box::new(project.clone())));
            }
        }
    }

    // =========================================================================
    // Workspace hosts
    // =========================================================================

    /// Registers a workspace host.
    pub fn register_host(&mut self, host: Arc<dyn WorkspaceHost>) -> Result<(), TrackerError> {
        self.context.assert_foreground();
        self.dispatcher.register(host)
    }

    /// Marks a host ready, replaying every pushing project to it on first
    /// activation. Later calls do nothing.
    pub fn mark_host_ready(&mut self, host: &Arc<dyn WorkspaceHost>) -> Result<(), TrackerError> {
        self.context.assert_foreground();
        if self.dispatcher.is_ready(host) {
            return Ok(());
        }

        let pushing = self.registry.pushing_ids();
        let order = self
            .registry
            .dependency_order(&pushing, |project| project.pushing);
        let interactive = self.registry.snapshot(&order);
        self.dispatcher.mark_ready(host, &interactive)?;
        Ok(())
    }

    // =========================================================================
    // Solution events
    // =========================================================================

    /// Records the solution being opened and its working folder.
    pub fn open_solution(&mut self, solution: Utf8PathBuf, working_folder: Option<Utf8PathBuf>) {
        self.context.assert_foreground();
        if let Some(folder) = working_folder {
            self.working_folders.register(solution.clone(), folder);
        }
        info!(solution = %solution, "Opening solution");
        self.session.open(solution);
    }

    /// Returns the folder relative paths of `project_file` resolve against.
    #[must_use]
    pub fn working_folder_for(&self, project_file: &Utf8Path) -> Utf8PathBuf {
        self.working_folders
            .resolve(self.session.solution(), project_file)
    }

    /// Records that the open solution is populated through deferred load.
    pub fn mark_deferred_load(&mut self) {
        self.context.assert_foreground();
        self.session.mark_deferred_load();
    }

    /// Opens a new load-batch window.
    pub fn before_load_project_batch(&mut self, background: bool) {
        self.context.assert_foreground();
        self.session.clear_batch();
        self.stats.increment_batches();
        debug!(background, "Project batch started");
    }

    /// Closes the load-batch window.
    ///
    /// Projects from a user-initiated batch start pushing now; projects
    /// from a background batch wait for the solution load to complete.
    pub fn after_load_project_batch(&mut self, background: bool) {
        self.context.assert_foreground();
        let batch = self.session.take_batch();
        debug!(background, count = batch.len(), "Project batch finished");
        if !background {
            self.start_pushing(&batch);
        }
    }

    /// Handles the host's background solution load finishing.
    pub fn after_background_solution_load_complete(&mut self) {
        self.finish_load();
    }

    /// Starts pushing every registered project and marks the load complete.
    pub fn finish_load(&mut self) {
        self.context.assert_foreground();
        let all = self.registry.ids();
        self.start_pushing(&all);
        self.session.set_load_complete(true);
        self.session.clear_batch();
        info!(projects = all.len(), "Solution load complete");
    }

    /// Stops every project from pushing and cancels background parsing.
    pub fn before_close_solution(&mut self) {
        self.context.assert_foreground();
        let pushing = self.registry.pushing_ids();
        for id in &pushing {
            self.registry.set_pushing(*id, false);
        }
        self.dispatcher.stop_pushing(&pushing);
        self.session.begin_close();
        info!(stopped = pushing.len(), "Closing solution");
    }

    /// Completes a solution close.
    ///
    /// When the solution was populated through deferred load every project
    /// still registered is disconnected first. The registry must then be
    /// empty; anything left is a fatal [`TrackerError::RegistryNotEmpty`].
    pub fn after_close_solution(&mut self) -> Result<(), TrackerError> {
        self.context.assert_foreground();
        if self.session.used_deferred_load() {
            let remaining = self.registry.ids();
            debug!(count = remaining.len(), "Disconnecting deferred projects");
            for id in remaining {
                self.remove_project(id)?;
            }
        }

        if !self.registry.is_empty() {
            return Err(TrackerError::RegistryNotEmpty {
                remaining: self.registry.len(),
            });
        }

        self.dispatcher.broadcast(&HostNotification::SolutionRemoved);
        self.dispatcher.broadcast(&HostNotification::ClearSolution);
        self.registry.clear_identities();
        self.working_folders.clear();
        self.dispatcher.solution_closed();
        self.session.finish_close();
        info!("Solution closed");
        Ok(())
    }
}
