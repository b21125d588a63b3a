//! Output-path index and reference reconciliation.
//!
//! [`OutputPathIndex`] is a multi-map from normalized output path to the
//! projects that write it. A binary reference to a path may be promoted to
//! a direct project reference only while exactly one project produces that
//! path. Every mutation of the index is bracketed so that promotions made
//! under the old producer set are revoked before the change and re-attempted
//! after it:
//!
//! 1. If the path had a sole producer, emit [`ReconcileAction::Undo`].
//! 2. Mutate the producer list.
//! 3. If the path now has a sole producer, emit [`ReconcileAction::Convert`].
//!
//! The index itself never touches projects. [`OutputPathIndex::update`]
//! returns the ordered actions and the registry applies them, so the
//! ambiguity rules can be exercised without any host machinery.
//!
//! # Examples
//!
//! ```
//! use pt_tracker::{OutputPathIndex, ReconcileAction};
//! use pt_core::{OutputPathKey, ProjectId};
//! use camino::Utf8Path;
//!
//! let key = OutputPathKey::new(Utf8Path::new("out/a.dll"));
//! let mut index = OutputPathIndex::new();
//!
//! let actions = index.update(ProjectId::new(1), None, Some(&key));
//! assert_eq!(actions.as_slice(), &[ReconcileAction::Convert { path: key.clone(), producer: ProjectId::new(1) }]);
//!
//! // A second producer makes the path ambiguous.
//! let actions = index.update(ProjectId::new(2), None, Some(&key));
//! assert_eq!(actions.as_slice(), &[ReconcileAction::Undo { path: key.clone(), producer: ProjectId::new(1) }]);
//! ```

use pt_core::{FxHashMap, OutputPathKey, ProjectId};
use smallvec::SmallVec;

/// A reference fix-up required by an output-path change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReconcileAction {
    /// Revert references promoted from `path` back to binary references.
    Undo {
        /// The output path whose promotions are revoked.
        path: OutputPathKey,
        /// The producer the revoked promotions pointed at.
        producer: ProjectId,
    },

    /// Promote binary references to `path` into references to `producer`.
    Convert {
        /// The output path now produced by exactly one project.
        path: OutputPathKey,
        /// The sole producer.
        producer: ProjectId,
    },
}

impl ReconcileAction {
    /// Returns the output path the action applies to.
    #[inline]
    #[must_use]
    pub const fn path(&self) -> &OutputPathKey {
        match self {
            Self::Undo { path, .. } | Self::Convert { path, .. } => path,
        }
    }
}

/// Ordered reconciliation actions produced by one index update.
pub type ReconcileActions = SmallVec<[ReconcileAction; 4]>;

/// Multi-map from output path to producing projects.
///
/// Paths with no producers are removed, so [`len`](Self::len) counts only
/// live outputs.
#[derive(Debug, Clone, Default)]
pub struct OutputPathIndex {
    producers: FxHashMap<OutputPathKey, SmallVec<[ProjectId; 2]>>,
}

impl OutputPathIndex {
    /// Creates an empty index.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every project producing `path`, in registration order.
    #[must_use]
    pub fn producers(&self, path: &OutputPathKey) -> &[ProjectId] {
        self.producers
            .get(path)
            .map(SmallVec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the producer of `path` if there is exactly one.
    #[must_use]
    pub fn sole_producer(&self, path: &OutputPathKey) -> Option<ProjectId> {
        match self.producers(path) {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Returns the number of distinct output paths.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.producers.len()
    }

    /// Returns `true` if no project produces any output.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }

    /// Moves `project` from output path `old` to `new`.
    ///
    /// Either side may be `None` (project added, removed, or gaining/losing
    /// an output). The old path is processed first. Returns the actions the
    /// caller must apply, in order.
    pub fn update(
        &mut self,
        project: ProjectId,
        old: Option<&OutputPathKey>,
        new: Option<&OutputPathKey>,
    ) -> ReconcileActions {
        let mut actions = ReconcileActions::new();
        if old == new {
            return actions;
        }

        if let Some(path) = old {
            self.bracket(path, &mut actions, |producers| {
                if let Some(position) = producers.iter().position(|id| *id == project) {
                    producers.remove(position);
                }
            });
        }

        if let Some(path) = new {
            self.bracket(path, &mut actions, |producers| {
                if !producers.contains(&project) {
                    producers.push(project);
                }
            });
        }

        actions
    }

    /// Wraps one producer-list mutation in undo / re-convert.
    fn bracket(
        &mut self,
        path: &OutputPathKey,
        actions: &mut ReconcileActions,
        mutate: impl FnOnce(&mut SmallVec<[ProjectId; 2]>),
    ) {
        if let Some(producer) = self.sole_producer(path) {
            actions.push(ReconcileAction::Undo {
                path: path.clone(),
                producer,
            });
        }

        let producers = self.producers.entry(path.clone()).or_default();
        mutate(producers);
        if producers.is_empty() {
            self.producers.remove(path);
        }

        if let Some(producer) = self.sole_producer(path) {
            actions.push(ReconcileAction::Convert {
                path: path.clone(),
                producer,
            });
        }
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.producers.clear();
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8Path;

    use super::*;

    fn key(path: &str) -> OutputPathKey {
        OutputPathKey::new(Utf8Path::new(path))
    }

    const A: ProjectId = ProjectId::new(1);
    const B: ProjectId = ProjectId::new(2);
    const C: ProjectId = ProjectId::new(3);

    #[test]
    fn test_first_producer_converts() {
        let mut index = OutputPathIndex::new();
        let actions = index.update(A, None, Some(&key("out/a.dll")));
        assert_eq!(
            actions.as_slice(),
            &[ReconcileAction::Convert {
                path: key("out/a.dll"),
                producer: A
            }]
        );
        assert_eq!(index.sole_producer(&key("OUT/A.DLL")), Some(A));
    }

    #[test]
    fn test_second_producer_undoes_only() {
        let mut index = OutputPathIndex::new();
        index.update(A, None, Some(&key("out/x.dll")));
        let actions = index.update(C, None, Some(&key("out/x.dll")));
        assert_eq!(
            actions.as_slice(),
            &[ReconcileAction::Undo {
                path: key("out/x.dll"),
                producer: A
            }]
        );
        assert_eq!(index.producers(&key("out/x.dll")), &[A, C]);
        assert_eq!(index.sole_producer(&key("out/x.dll")), None);
    }

    #[test]
    fn test_removing_ambiguity_reconverts() {
        let mut index = OutputPathIndex::new();
        index.update(A, None, Some(&key("out/x.dll")));
        index.update(C, None, Some(&key("out/x.dll")));

        let actions = index.update(C, Some(&key("out/x.dll")), None);
        assert_eq!(
            actions.as_slice(),
            &[ReconcileAction::Convert {
                path: key("out/x.dll"),
                producer: A
            }]
        );
    }

    #[test]
    fn test_last_producer_removed_drops_entry() {
        let mut index = OutputPathIndex::new();
        index.update(A, None, Some(&key("out/a.dll")));
        let actions = index.update(A, Some(&key("out/a.dll")), None);
        assert_eq!(
            actions.as_slice(),
            &[ReconcileAction::Undo {
                path: key("out/a.dll"),
                producer: A
            }]
        );
        assert!(index.is_empty());
        assert!(index.producers(&key("out/a.dll")).is_empty());
    }

    #[test]
    fn test_move_processes_old_then_new() {
        let mut index = OutputPathIndex::new();
        index.update(A, None, Some(&key("out/old.dll")));
        index.update(B, None, Some(&key("out/new.dll")));

        let actions = index.update(A, Some(&key("out/old.dll")), Some(&key("out/new.dll")));
        assert_eq!(
            actions.as_slice(),
            &[
                ReconcileAction::Undo {
                    path: key("out/old.dll"),
                    producer: A
                },
                ReconcileAction::Undo {
                    path: key("out/new.dll"),
                    producer: B
                },
            ]
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_unchanged_path_is_noop() {
        let mut index = OutputPathIndex::new();
        index.update(A, None, Some(&key("out/a.dll")));
        let actions = index.update(A, Some(&key("out/a.dll")), Some(&key("OUT/a.dll")));
        assert!(actions.is_empty());
    }

    #[test]
    fn test_removing_unknown_producer_keeps_state() {
        let mut index = OutputPathIndex::new();
        index.update(A, None, Some(&key("out/a.dll")));
        let actions = index.update(B, Some(&key("out/a.dll")), None);
        assert_eq!(
            actions.as_slice(),
            &[
                ReconcileAction::Undo {
                    path: key("out/a.dll"),
                    producer: A
                },
                ReconcileAction::Convert {
                    path: key("out/a.dll"),
                    producer: A
                },
            ]
        );
        assert_eq!(index.sole_producer(&key("out/a.dll")), Some(A));
    }
}
