//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Memos Work
//!
//! 1. A memo starts stale. Nothing runs until the first read.
//!
//! 2. On read, a stale memo recomputes synchronously, caches the result, and
//!    becomes clean. Reading a clean memo returns the cache.
//!
//! 3. When a signal is written, every memo reachable from it is marked stale
//!    (push phase) and every effect reachable from it is queued once.
//!
//! 4. Queued effects read the memos they need, which recompute on the spot
//!    (pull phase). Recomputing does not queue anything else: the push phase
//!    already found every affected effect.
//!
//! # Why This Matters
//!
//! Splitting push and pull is what makes a diamond glitch-free:
//!
//! - `a` feeds memos `b` and `c`
//! - an effect reads both `b` and `c`
//! - writing `a` marks `b` and `c` stale and queues the effect once
//! - the effect runs once and sees both memos recomputed from the new `a`
//!
//! Memos that are never read stay stale and cost nothing.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::error::{ReactiveError, Result};
use crate::graph::{Body, NodeId, NodeKind};

use super::runtime::{dispose_node, is_alive, run_computation, value_cell, with_runtime};
use super::tracking::Readable;

/// Typed storage behind a memo node.
pub(crate) struct MemoCell<T> {
    value: RefCell<Option<T>>,
}

/// Create a memo computing its value with `compute`.
///
/// The memo is owned by the current owner and disposed with it.
///
/// # Example
///
/// ```rust,ignore
/// let (count, set_count) = create_signal(2);
/// let doubled = create_memo(move || count.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// set_count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub fn create_memo<T: 'static>(compute: impl Fn() -> T + 'static) -> Memo<T> {
    let cell = Rc::new(MemoCell {
        value: RefCell::new(None),
    });
    let target = cell.clone();
    let body: Body = Rc::new(move || {
        let value = compute();
        *target.value.borrow_mut() = Some(value);
    });

    let id = with_runtime(|rt| {
        if rt.current_owner().is_none() {
            tracing::debug!("memo created without an owner; it lives until disposed");
        }
        rt.create_node(NodeKind::Memo, Some(cell), Some(body))
    });
    Memo {
        id,
        ty: PhantomData,
    }
}

/// A cached derived value. Copy handle.
pub struct Memo<T> {
    id: NodeId,
    ty: PhantomData<fn() -> T>,
}

impl<T> Memo<T> {
    /// Arena handle of this memo.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether the memo has been disposed.
    pub fn is_disposed(&self) -> bool {
        !is_alive(self.id)
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        with_runtime(|rt| rt.nodes.get(self.id).is_some_and(|node| !node.is_clean()))
    }

    /// Number of completed recomputations.
    pub fn version(&self) -> Result<u64> {
        with_runtime(|rt| {
            rt.nodes
                .get(self.id)
                .map(|node| node.version)
                .ok_or(ReactiveError::Disposed(NodeKind::Memo))
        })
    }

    /// Number of signals and memos read during the last computation.
    pub fn dependency_count(&self) -> usize {
        with_runtime(|rt| rt.nodes.get(self.id).map_or(0, |node| node.sources.len()))
    }

    /// Release the memo and everything its computation owns.
    pub fn dispose(&self) {
        dispose_node(self.id);
    }

    /// Recompute if stale. Fails if the memo is gone or is reading itself.
    fn refresh(&self) -> Result<()> {
        let dirty = with_runtime(|rt| {
            let node = rt
                .nodes
                .get(self.id)
                .ok_or(ReactiveError::Disposed(NodeKind::Memo))?;
            if rt.is_running(self.id) {
                return Err(ReactiveError::Cycle(NodeKind::Memo));
            }
            Ok(!node.is_clean())
        })?;
        if dirty {
            run_computation(self.id)?;
        }
        Ok(())
    }
}

impl<T: 'static> Memo<T> {
    /// Borrow the current value, recomputing first if stale, and register the
    /// read with the running computation.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        self.refresh()?;
        let cell = value_cell::<MemoCell<T>>(self.id, NodeKind::Memo, true)?;
        let value = cell.value.borrow();
        // Only empty when the last computation panicked.
        let result = value.as_ref().map(f);
        result.ok_or(ReactiveError::Disposed(NodeKind::Memo))
    }

    /// Borrow the current value, recomputing first if stale.
    #[track_caller]
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Get the current value, or `Err` if the memo was disposed or read
    /// itself while computing.
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Get the current value, recomputing first if a dependency changed.
    #[track_caller]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without registering a dependency.
    #[track_caller]
    pub fn get_untracked(&self) -> T {
        Readable::get_untracked(self)
    }
}

impl<T: Clone + 'static> Readable for Memo<T> {
    type Value = T;

    fn try_get(&self) -> Result<T> {
        Memo::try_get(self)
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Memo<T> {}

impl<T> PartialEq for Memo<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Memo<T> {}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
