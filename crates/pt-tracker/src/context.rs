//! Foreground thread affinity.
//!
//! The tracker is a single-writer structure: registry mutation, notification
//! dispatch and the solution session all belong to one sequential context,
//! the thread that created the tracker. Operations that are only valid there
//! call [`ForegroundContext::assert_foreground`] before touching any state.

use std::thread::{self, ThreadId};

/// Captures the thread that owns the tracker.
///
/// # Examples
///
/// ```
/// use pt_tracker::ForegroundContext;
///
/// let context = ForegroundContext::current();
/// assert!(context.is_foreground());
/// context.assert_foreground();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForegroundContext {
    owner: ThreadId,
}

impl ForegroundContext {
    /// Binds a context to the calling thread.
    #[must_use]
    pub fn current() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// Returns `true` when called from the owning thread.
    #[inline]
    #[must_use]
    pub fn is_foreground(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Panics unless called from the owning thread.
    ///
    /// This is a hard precondition of every foreground-only operation.
    #[track_caller]
    pub fn assert_foreground(&self) {
        assert!(
            self.is_foreground(),
            "foreground-only tracker operation called from {:?}, owner is {:?}",
            thread::current().id(),
            self.owner
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_thread_is_foreground() {
        let context = ForegroundContext::current();
        assert!(context.is_foreground());
    }

    #[test]
    fn test_other_thread_is_not_foreground() {
        let context = ForegroundContext::current();
        let on_other = thread::spawn(move || context.is_foreground())
            .join()
            .unwrap();
        assert!(!on_other);
    }

    #[test]
    fn test_assert_panics_off_thread() {
        let context = ForegroundContext::current();
        let result = thread::spawn(move || context.assert_foreground()).join();
        assert!(result.is_err());
    }
}
