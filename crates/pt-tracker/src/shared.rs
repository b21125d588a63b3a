//! Background-safe identity and output-path lookups.
//!
//! [`SharedIndices`] is the only tracker state reachable from more than one
//! thread. It pairs the path-to-identity map with the [`OutputPathIndex`],
//! each behind its own [`parking_lot::Mutex`]. Locks are held only for the
//! duration of a single lookup or update and values are copied out, in the
//! same spirit as a clone-on-get cache.
//!
//! # Examples
//!
//! ```
//! use pt_tracker::SharedIndices;
//!
//! let shared = SharedIndices::new();
//! let handle = shared.clone();
//!
//! let id = std::thread::spawn(move || {
//!     handle.get_or_create_project_id_for_path("src/Core/Core.csproj", "Core")
//! })
//! .join()
//! .unwrap();
//!
//! assert_eq!(shared.get_or_create_project_id_for_path("src/Core/Core.csproj", "Core"), id);
//! ```

use std::sync::Arc;

use camino::Utf8Path;
use parking_lot::Mutex;
use pt_core::{FxHashMap, OutputPathKey, ProjectId};
use smallvec::SmallVec;

use crate::index::{OutputPathIndex, ReconcileActions};

/// Path-keyed identity assignment.
#[derive(Debug, Default)]
struct IdentityMap {
    ids: FxHashMap<String, ProjectId>,
    last: u64,
}

impl IdentityMap {
    fn allocate(&mut self) -> ProjectId {
        self.last += 1;
        ProjectId::new(self.last)
    }
}

#[derive(Debug, Default)]
struct Inner {
    identities: Mutex<IdentityMap>,
    output_paths: Mutex<OutputPathIndex>,
}

/// Cloneable handle to the indices shared with background work.
///
/// `SharedIndices` is `Send + Sync`; clones refer to the same maps.
#[derive(Debug, Clone, Default)]
pub struct SharedIndices {
    inner: Arc<Inner>,
}

impl SharedIndices {
    /// Creates empty indices.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the identity for a project discovered at `path` named `name`.
    ///
    /// Repeated calls with the same inputs return the same identity until
    /// the solution closes. Safe to call from any thread.
    pub fn get_or_create_project_id_for_path(&self, path: &str, name: &str) -> ProjectId {
        let mut identities = self.inner.identities.lock();
        let key = format!("{path}{name}");
        if let Some(id) = identities.ids.get(&key) {
            return *id;
        }
        let id = identities.allocate();
        identities.ids.insert(key, id);
        id
    }

    /// Allocates an identity that is not tied to any path.
    pub fn allocate_project_id(&self) -> ProjectId {
        self.inner.identities.lock().allocate()
    }

    /// Returns the number of path-keyed identities assigned this session.
    #[must_use]
    pub fn identity_count(&self) -> usize {
        self.inner.identities.lock().ids.len()
    }

    /// Returns the projects producing `path`, in registration order.
    #[must_use]
    pub fn producers(&self, path: &Utf8Path) -> SmallVec<[ProjectId; 2]> {
        let key = OutputPathKey::new(path);
        SmallVec::from_slice(self.inner.output_paths.lock().producers(&key))
    }

    /// Returns the producer of `path` if exactly one project writes it.
    #[must_use]
    pub fn sole_producer(&self, path: &Utf8Path) -> Option<ProjectId> {
        let key = OutputPathKey::new(path);
        self.inner.output_paths.lock().sole_producer(&key)
    }

    /// Returns the number of distinct output paths currently produced.
    #[must_use]
    pub fn output_path_count(&self) -> usize {
        self.inner.output_paths.lock().len()
    }

    pub(crate) fn sole_producer_of(&self, key: &OutputPathKey) -> Option<ProjectId> {
        self.inner.output_paths.lock().sole_producer(key)
    }

    pub(crate) fn update_output_path(
        &self,
        project: ProjectId,
        old: Option<&OutputPathKey>,
        new: Option<&OutputPathKey>,
    ) -> ReconcileActions {
        self.inner.output_paths.lock().update(project, old, new)
    }

    /// Forgets every path-keyed identity. Allocation keeps counting so
    /// identities are never reused within the process.
    pub(crate) fn clear_identities(&self) {
        self.inner.identities.lock().ids.clear();
    }
}
