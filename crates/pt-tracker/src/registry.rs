//! The authoritative project registry.
//!
//! [`ProjectRegistry`] owns every registered [`Project`] and keeps the
//! output-path index in [`SharedIndices`] consistent with them. Every
//! output-path transition goes through the index and the resulting
//! [`ReconcileAction`]s are applied to the registered projects before the
//! mutating call returns.
//!
//! The registry is owned by the foreground context. Only the shared indices
//! are handed to background work.

use camino::{Utf8Path, Utf8PathBuf};
use pt_core::{FxHashMap, FxHashSet, MetadataReference, OutputPathKey, Project, ProjectId};
use smallvec::SmallVec;
use tracing::debug;

use crate::error::TrackerError;
use crate::index::ReconcileAction;
use crate::shared::SharedIndices;

/// Projects whose references changed while reconciling one mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    promoted: SmallVec<[ProjectId; 4]>,
    demoted: SmallVec<[ProjectId; 4]>,
}

impl Reconciliation {
    /// Projects that gained a direct reference, in application order.
    #[must_use]
    pub fn promoted(&self) -> &[ProjectId] {
        &self.promoted
    }

    /// Projects that lost a promoted reference, in application order.
    #[must_use]
    pub fn demoted(&self) -> &[ProjectId] {
        &self.demoted
    }

    /// Returns `true` if no reference changed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.demoted.is_empty()
    }

    /// Returns every changed project once, sorted by identity.
    #[must_use]
    pub fn changed(&self) -> Vec<ProjectId> {
        let mut changed: Vec<ProjectId> = self
            .promoted
            .iter()
            .chain(self.demoted.iter())
            .copied()
            .collect();
        changed.sort_unstable();
        changed.dedup();
        changed
    }
}

/// Mapping from project identity to project state.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    projects: FxHashMap<ProjectId, Project>,
    shared: SharedIndices,
}

impl ProjectRegistry {
    /// Creates an empty registry backed by `shared`.
    #[must_use]
    pub fn new(shared: SharedIndices) -> Self {
        Self {
            projects: FxHashMap::default(),
            shared,
        }
    }

    /// Returns the background-safe indices.
    #[inline]
    #[must_use]
    pub fn shared(&self) -> &SharedIndices {
        &self.shared
    }

    /// Returns the number of registered projects.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Returns `true` if no project is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Returns `true` if `id` is registered.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: ProjectId) -> bool {
        self.projects.contains_key(&id)
    }

    /// Looks up a registered project.
    #[inline]
    #[must_use]
    pub fn get(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    /// Returns every registered identity, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self.projects.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the identities of projects currently pushing, sorted.
    #[must_use]
    pub fn pushing_ids(&self) -> Vec<ProjectId> {
        let mut ids: Vec<ProjectId> = self
            .projects
            .values()
            .filter(|project| project.pushing)
            .map(|project| project.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Returns registered projects whose file is `path` (case-insensitive),
    /// sorted by identity.
    #[must_use]
    pub fn projects_with_file_path(&self, path: &Utf8Path) -> Vec<&Project> {
        let mut found: Vec<&Project> = self
            .projects
            .values()
            .filter(|project| {
                project
                    .file_path
                    .as_deref()
                    .is_some_and(|file| file.as_str().eq_ignore_ascii_case(path.as_str()))
            })
            .collect();
        found.sort_unstable_by_key(|project| project.id);
        found
    }

    /// Clones the given projects, skipping unknown identities.
    #[must_use]
    pub fn snapshot(&self, ids: &[ProjectId]) -> Vec<Project> {
        ids.iter()
            .filter_map(|id| self.projects.get(id))
            .cloned()
            .collect()
    }

    /// Orders `seeds` and their transitive project references so that
    /// dependencies come before dependents.
    ///
    /// Only registered projects accepted by `include` are visited. Cycles
    /// terminate on the visited set.
    pub fn dependency_order(
        &self,
        seeds: &[ProjectId],
        include: impl Fn(&Project) -> bool,
    ) -> Vec<ProjectId> {
        let mut visited = FxHashSet::default();
        let mut order = Vec::new();

        for seed in seeds {
            let mut stack = vec![(*seed, false)];
            while let Some((id, expanded)) = stack.pop() {
                if expanded {
                    order.push(id);
                    continue;
                }
                let Some(project) = self.projects.get(&id) else {
                    continue;
                };
                if !include(project) || !visited.insert(id) {
                    continue;
                }

                stack.push((id, true));
                let dependencies: SmallVec<[ProjectId; 4]> = project.project_references().collect();
                for dependency in dependencies.into_iter().rev() {
                    if !visited.contains(&dependency) {
                        stack.push((dependency, false));
                    }
                }
            }
        }

        order
    }

    /// Registers a project and reconciles references around its output.
    ///
    /// The new project's own binary references are promoted against any
    /// path that already has a sole producer.
    pub(crate) fn insert(&mut self, mut project: Project) -> Result<Reconciliation, TrackerError> {
        let id = project.id;
        if self.projects.contains_key(&id) {
            return Err(TrackerError::ProjectAlreadyRegistered(id));
        }

        let mut outcome = Reconciliation::default();
        let keys: SmallVec<[OutputPathKey; 4]> = project
            .metadata_references()
            .map(MetadataReference::key)
            .collect();
        for key in keys {
            let Some(producer) = self.shared.sole_producer_of(&key) else {
                continue;
            };
            if project.try_convert_to_project_reference(&key, producer) {
                outcome.promoted.push(id);
            }
        }

        let output = project.output_key();
        self.projects.insert(id, project);

        let actions = self.shared.update_output_path(id, None, output.as_ref());
        self.apply(&actions, &mut outcome);

        debug!(project = %id, promoted = outcome.promoted.len(), "Registered project");
        Ok(outcome)
    }

    /// Unregisters a project and demotes references that relied on it.
    pub(crate) fn remove(
        &mut self,
        id: ProjectId,
    ) -> Result<(Project, Reconciliation), TrackerError> {
        let project = self
            .projects
            .remove(&id)
            .ok_or(TrackerError::ProjectNotRegistered(id))?;

        let mut outcome = Reconciliation::default();
        let actions = self
            .shared
            .update_output_path(id, project.output_key().as_ref(), None);
        self.apply(&actions, &mut outcome);

        debug!(project = %id, demoted = outcome.demoted.len(), "Unregistered project");
        Ok((project, outcome))
    }

    /// Changes a project's output binary.
    pub(crate) fn set_bin_output_path(
        &mut self,
        id: ProjectId,
        path: Option<Utf8PathBuf>,
    ) -> Result<Reconciliation, TrackerError> {
        let project = self
            .projects
            .get_mut(&id)
            .ok_or(TrackerError::ProjectNotRegistered(id))?;

        let old = project.output_key();
        project.bin_output_path = path;
        let new = project.output_key();

        let mut outcome = Reconciliation::default();
        let actions = self.shared.update_output_path(id, old.as_ref(), new.as_ref());
        self.apply(&actions, &mut outcome);
        Ok(outcome)
    }

    /// Sets the pushing flag, returning the previous value.
    pub(crate) fn set_pushing(&mut self, id: ProjectId, pushing: bool) -> bool {
        self.projects
            .get_mut(&id)
            .is_some_and(|project| std::mem::replace(&mut project.pushing, pushing))
    }

    /// Forgets path-keyed identities at the end of a solution session.
    pub(crate) fn clear_identities(&self) {
        self.shared.clear_identities();
    }

    fn apply(&mut self, actions: &[ReconcileAction], outcome: &mut Reconciliation) {
        for action in actions {
            match action {
                ReconcileAction::Undo { path, .. } => {
                    for project in self.projects.values_mut() {
                        if project.undo_project_reference_conversion(path) {
                            outcome.demoted.push(project.id);
                        }
                    }
                }
                ReconcileAction::Convert { path, producer } => {
                    for project in self.projects.values_mut() {
                        if project.try_convert_to_project_reference(path, *producer) {
                            outcome.promoted.push(project.id);
                        }
                    }
                }
            }
        }
    }
}
