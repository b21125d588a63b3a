//! Solution-load session state.
//!
//! - [`SolutionSession`] - closing / load-complete flags, the current load
//!   batch, and the cancellation token for background parsing
//! - [`WorkingFolders`] - working folder registered per open solution
//!
//! Both are foreground-only and need no synchronization.

use camino::{Utf8Path, Utf8PathBuf};
use pt_core::{FxHashMap, ProjectId};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Per-solution bookkeeping driven by host events.
///
/// The cancellation token is one-shot: [`renew_cancellation`] cancels the
/// current token and installs a fresh one, so work started for a closing
/// solution never observes an un-cancelled token again.
///
/// [`renew_cancellation`]: SolutionSession::renew_cancellation
#[derive(Debug, Default)]
pub struct SolutionSession {
    solution: Option<Utf8PathBuf>,
    closing: bool,
    load_complete: bool,
    deferred_load: bool,
    batch: Vec<ProjectId>,
    cancellation: CancellationToken,
}

impl SolutionSession {
    /// Creates an idle session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the open solution, if any.
    #[must_use]
    pub fn solution(&self) -> Option<&Utf8Path> {
        self.solution.as_deref()
    }

    /// Records the solution being opened.
    pub fn open(&mut self, solution: Utf8PathBuf) {
        self.solution = Some(solution);
    }

    /// Returns `true` between before-close and after-close.
    #[inline]
    #[must_use]
    pub const fn is_closing(&self) -> bool {
        self.closing
    }

    /// Returns `true` once the solution has finished loading.
    #[inline]
    #[must_use]
    pub const fn is_load_complete(&self) -> bool {
        self.load_complete
    }

    /// Returns `true` if the solution was populated by deferred load.
    #[inline]
    #[must_use]
    pub const fn used_deferred_load(&self) -> bool {
        self.deferred_load
    }

    pub(crate) fn set_load_complete(&mut self, complete: bool) {
        self.load_complete = complete;
    }

    pub(crate) fn mark_deferred_load(&mut self) {
        self.deferred_load = true;
    }

    /// Returns the projects added in the current batch window.
    #[must_use]
    pub fn batch(&self) -> &[ProjectId] {
        &self.batch
    }

    pub(crate) fn record_loaded(&mut self, id: ProjectId) {
        self.batch.push(id);
    }

    pub(crate) fn forget(&mut self, id: ProjectId) {
        self.batch.retain(|loaded| *loaded != id);
    }

    pub(crate) fn clear_batch(&mut self) {
        self.batch.clear();
    }

    pub(crate) fn take_batch(&mut self) -> Vec<ProjectId> {
        std::mem::take(&mut self.batch)
    }

    /// Returns a handle to the current cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub(crate) fn begin_close(&mut self) {
        self.closing = true;
        self.load_complete = false;
        self.renew_cancellation();
    }

    /// Cancels outstanding background work and installs a fresh token.
    pub(crate) fn renew_cancellation(&mut self) {
        self.cancellation.cancel();
        self.cancellation = CancellationToken::new();
    }

    pub(crate) fn finish_close(&mut self) {
        self.solution = None;
        self.closing = false;
        self.deferred_load = false;
        self.batch.clear();
    }
}

/// Working folders keyed by solution path.
///
/// Entries live from solution open until after-close.
#[derive(Debug, Default)]
pub struct WorkingFolders {
    folders: FxHashMap<Utf8PathBuf, Utf8PathBuf>,
}

impl WorkingFolders {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the working folder of `solution`.
    pub fn register(&mut self, solution: Utf8PathBuf, folder: Utf8PathBuf) {
        self.folders.insert(solution, folder);
    }

    /// Returns the working folder registered for `solution`.
    #[must_use]
    pub fn get(&self, solution: &Utf8Path) -> Option<&Utf8Path> {
        self.folders.get(solution).map(Utf8PathBuf::as_path)
    }

    /// Resolves the folder relative paths of `project_file` are read against.
    ///
    /// Falls back to the project file's directory when `solution` has no
    /// registered folder.
    #[must_use]
    pub fn resolve(&self, solution: Option<&Utf8Path>, project_file: &Utf8Path) -> Utf8PathBuf {
        if let Some(folder) = solution.and_then(|solution| self.get(solution)) {
            return folder.to_owned();
        }

        let fallback = project_file
            .parent()
            .map_or_else(Utf8PathBuf::new, Utf8Path::to_path_buf);
        warn!(
            solution = ?solution,
            project = %project_file,
            fallback = %fallback,
            "No working folder registered, using project directory"
        );
        fallback
    }

    /// Returns the number of registered solutions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.folders.len()
    }

    /// Returns `true` if no solution is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    /// Forgets every registration.
    pub fn clear(&mut self) {
        self.folders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_one_shot() {
        let mut session = SolutionSession::new();
        let first = session.cancellation_token();
        session.begin_close();

        assert!(first.is_cancelled());
        assert!(!session.cancellation_token().is_cancelled());
        assert!(session.is_closing());
    }

    #[test]
    fn test_batch_window() {
        let mut session = SolutionSession::new();
        session.record_loaded(ProjectId::new(1));
        session.record_loaded(ProjectId::new(2));
        session.forget(ProjectId::new(1));
        assert_eq!(session.batch(), &[ProjectId::new(2)]);

        assert_eq!(session.take_batch(), vec![ProjectId::new(2)]);
        assert!(session.batch().is_empty());
    }

    #[test]
    fn test_finish_close_resets() {
        let mut session = SolutionSession::new();
        session.open(Utf8PathBuf::from("app.sln"));
        session.mark_deferred_load();
        session.set_load_complete(true);
        session.begin_close();
        assert!(!session.is_load_complete());

        session.finish_close();
        assert!(!session.is_closing());
        assert!(!session.used_deferred_load());
        assert!(session.solution().is_none());
    }

    #[test]
    fn test_working_folder_lookup() {
        let mut folders = WorkingFolders::new();
        folders.register(Utf8PathBuf::from("/src/app.sln"), Utf8PathBuf::from("/src"));

        let resolved = folders.resolve(
            Some(Utf8Path::new("/src/app.sln")),
            Utf8Path::new("/src/Core/Core.csproj"),
        );
        assert_eq!(resolved, Utf8PathBuf::from("/src"));
    }

    #[test]
    fn test_working_folder_fallback() {
        let folders = WorkingFolders::new();
        let resolved = folders.resolve(
            Some(Utf8Path::new("/src/app.sln")),
            Utf8Path::new("/src/Core/Core.csproj"),
        );
        assert_eq!(resolved, Utf8PathBuf::from("/src/Core"));
    }

    #[test]
    fn test_working_folders_clear() {
        let mut folders = WorkingFolders::new();
        folders.register(Utf8PathBuf::from("a.sln"), Utf8PathBuf::from("a"));
        folders.clear();
        assert!(folders.is_empty());
    }
}
