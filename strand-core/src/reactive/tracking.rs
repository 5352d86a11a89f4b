//! Dependency Tracking
//!
//! The tracking stack records which computation is currently running. When a
//! signal or memo is read, the entry on top of the stack becomes one of its
//! observers.
//!
//! # Implementation
//!
//! Entering a computation pushes `Some(id)`; [`untrack`] and ownership roots
//! push `None`, which hides the enclosing computation from reads without
//! losing it. Entries are popped by drop guards, so the stack stays balanced
//! even when a body panics.
//!
//! The current owner is a separate single slot with the same discipline:
//! [`OwnerGuard`] swaps it in and restores the previous value on drop.

use crate::error::Result;
use crate::graph::NodeId;

use super::runtime::with_runtime;

/// Guard that pops the tracking stack when dropped.
pub(crate) struct ObserverGuard {
    observer: Option<NodeId>,
}

impl ObserverGuard {
    /// Make `observer` the target of dependency registration until the guard
    /// is dropped. `None` disables tracking.
    pub(crate) fn enter(observer: Option<NodeId>) -> Self {
        with_runtime(|rt| rt.tracking.push(observer));
        Self { observer }
    }
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let popped = with_runtime(|rt| rt.tracking.pop());

        // Catch mismatched guards early.
        debug_assert_eq!(
            popped,
            Some(self.observer),
            "tracking stack mismatch: expected {:?}, got {:?}",
            self.observer,
            popped
        );
    }
}

/// Guard that restores the previous owner when dropped.
pub(crate) struct OwnerGuard {
    previous: Option<NodeId>,
}

impl OwnerGuard {
    /// Make `owner` the current owner until the guard is dropped.
    pub(crate) fn enter(owner: Option<NodeId>) -> Self {
        let previous = with_runtime(|rt| std::mem::replace(&mut rt.owner, owner));
        Self { previous }
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        with_runtime(|rt| rt.owner = previous);
    }
}

/// Run `f` without registering any of its reads with the running computation.
///
/// ```rust,ignore
/// create_effect(move || {
///     // Re-runs when `a` changes, not when `b` changes.
///     let sum = a.get() + untrack(|| b.get());
/// });
/// ```
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _untracked = ObserverGuard::enter(None);
    f()
}

/// Whether reads made right now would be registered as dependencies.
pub fn is_tracking() -> bool {
    with_runtime(|rt| rt.current_observer().is_some())
}

/// Something whose current value can be read, with or without tracking.
///
/// Implemented by the signal, memo, and resource handles, and by any
/// `Fn() -> T` getter.
pub trait Readable {
    /// The value produced by a read.
    type Value;

    /// Read the value and register the read with the running computation.
    fn try_get(&self) -> Result<Self::Value>;

    /// Read the value without registering a dependency.
    fn try_get_untracked(&self) -> Result<Self::Value> {
        untrack(|| self.try_get())
    }

    /// Like [`try_get`](Self::try_get), panicking on a disposed handle.
    #[track_caller]
    fn get(&self) -> Self::Value {
        self.try_get().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Like [`try_get_untracked`](Self::try_get_untracked), panicking on a
    /// disposed handle.
    #[track_caller]
    fn get_untracked(&self) -> Self::Value {
        self.try_get_untracked().unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<F, T> Readable for F
where
    F: Fn() -> T,
{
    type Value = T;

    fn try_get(&self) -> Result<T> {
        Ok(self())
    }
}

/// Read a signal, memo, resource, or getter without tracking it.
#[track_caller]
pub fn peek<R: Readable + ?Sized>(source: &R) -> R::Value {
    source.get_untracked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    fn node() -> NodeId {
        with_runtime(|rt| rt.create_node(NodeKind::Effect, None, None))
    }

    #[test]
    fn guards_track_the_running_computation() {
        let id = node();
        assert!(!is_tracking());

        {
            let _observer = ObserverGuard::enter(Some(id));
            assert!(is_tracking());
            assert_eq!(with_runtime(|rt| rt.current_observer()), Some(id));
        }

        assert!(!is_tracking());
    }

    #[test]
    fn nested_guards_restore_the_outer_observer() {
        let outer = node();
        let inner = node();

        let _outer = ObserverGuard::enter(Some(outer));
        {
            let _inner = ObserverGuard::enter(Some(inner));
            assert_eq!(with_runtime(|rt| rt.current_observer()), Some(inner));
        }
        assert_eq!(with_runtime(|rt| rt.current_observer()), Some(outer));
    }

    #[test]
    fn untrack_hides_the_observer() {
        let id = node();
        let _observer = ObserverGuard::enter(Some(id));

        assert!(!untrack(is_tracking));
        assert!(is_tracking());
    }

    #[test]
    fn owner_guard_restores_on_unwind() {
        let id = node();
        let result = std::panic::catch_unwind(|| {
            let _owner = OwnerGuard::enter(Some(id));
            panic!("boom");
        });

        assert!(result.is_err());
        assert_eq!(with_runtime(|rt| rt.owner), None);
    }

    #[test]
    fn peek_reads_getters() {
        assert_eq!(peek(&|| 41 + 1), 42);
    }
}
