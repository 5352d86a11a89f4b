//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a running computation (memo/effect), the
//!    signal registers that computation as an observer.
//!
//! 2. When a signal is written, the value is replaced, its version is bumped,
//!    low-level subscribers are called, and every observer is marked.
//!
//! 3. Outside a batch the write flushes right away, so effects have run by the
//!    time `set` returns.
//!
//! There is no equality check: every write notifies, even if the new value
//! equals the old one.
//!
//! # Lifetime
//!
//! A signal is not owned by the scope that created it. It lives until
//! [`WriteSignal::dispose`] is called (typically from `on_cleanup`) or the
//! runtime is reset. Reading or writing a disposed signal is a lifecycle bug:
//! the plain accessors panic, the `try_` variants return
//! [`ReactiveError::Disposed`].

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};

use super::runtime::{dispose_node, is_alive, propagate, value_cell, with_runtime};
use super::subscriber::{SubscriberId, Subscribers, Subscription, Unsubscribe};
use super::tracking::Readable;

/// Typed storage behind a signal node.
pub(crate) struct SignalCell<T> {
    value: RefCell<T>,
    subscribers: Subscribers<T>,
}

impl<T: 'static> Unsubscribe for SignalCell<T> {
    fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.subscribers.remove(id)
    }
}

/// Create a signal holding `initial`.
///
/// # Example
///
/// ```rust,ignore
/// let (count, set_count) = create_signal(0);
///
/// assert_eq!(count.get(), 0);
/// set_count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub fn create_signal<T: 'static>(initial: T) -> (ReadSignal<T>, WriteSignal<T>) {
    let cell = Rc::new(SignalCell {
        value: RefCell::new(initial),
        subscribers: Subscribers::new(),
    });
    let id = with_runtime(|rt| rt.create_node(NodeKind::Signal, Some(cell), None));
    (ReadSignal::from_id(id), WriteSignal::from_id(id))
}

fn cell<T: 'static>(id: NodeId, track: bool) -> Result<Rc<SignalCell<T>>> {
    value_cell::<SignalCell<T>>(id, NodeKind::Signal, track)
}

/// The read half of a signal.
pub struct ReadSignal<T> {
    id: NodeId,
    ty: PhantomData<fn() -> T>,
}

/// The write half of a signal.
pub struct WriteSignal<T> {
    id: NodeId,
    ty: PhantomData<fn(T)>,
}

impl<T> ReadSignal<T> {
    fn from_id(id: NodeId) -> Self {
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Arena handle of this signal.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether the signal has been disposed.
    pub fn is_disposed(&self) -> bool {
        !is_alive(self.id)
    }
}

impl<T: 'static> ReadSignal<T> {
    /// Borrow the value and register the read with the running computation.
    pub fn try_with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let cell = cell::<T>(self.id, true)?;
        let value = cell.value.borrow();
        Ok(f(&value))
    }

    /// Borrow the value without tracking.
    pub fn try_with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R> {
        let cell = cell::<T>(self.id, false)?;
        let value = cell.value.borrow();
        Ok(f(&value))
    }

    /// Borrow the value and register the read.
    #[track_caller]
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Borrow the value without tracking.
    #[track_caller]
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.try_with_untracked(f).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Number of writes since creation.
    pub fn version(&self) -> Result<u64> {
        with_runtime(|rt| {
            rt.nodes
                .get(self.id)
                .map(|node| node.version)
                .ok_or(ReactiveError::Disposed(NodeKind::Signal))
        })
    }

    /// Number of computations that read this signal during their last run.
    pub fn observer_count(&self) -> usize {
        with_runtime(|rt| rt.nodes.get(self.id).map_or(0, |node| node.observers.len()))
    }

    /// Call `callback` with the new value on every write.
    ///
    /// Subscribers bypass the computation machinery entirely: they run
    /// synchronously inside `set`, before effects, and are not batched.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Result<Subscription> {
        let cell = cell::<T>(self.id, false)?;
        let id = cell.subscribers.add(callback);
        let target: Weak<dyn Unsubscribe> = Rc::downgrade(&cell) as Weak<SignalCell<T>>;
        Ok(Subscription::new(id, target))
    }

    /// Number of attached low-level subscribers.
    pub fn subscriber_count(&self) -> usize {
        cell::<T>(self.id, false).map_or(0, |cell| cell.subscribers.len())
    }
}

impl<T: Clone + 'static> ReadSignal<T> {
    /// Get the current value.
    ///
    /// If called within a running computation, this also registers that
    /// computation as an observer.
    #[track_caller]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value, or `Err` if the signal was disposed.
    pub fn try_get(&self) -> Result<T> {
        self.try_with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    ///
    /// Use this when you need to read the value without establishing
    /// a reactive dependency.
    #[track_caller]
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: Clone + 'static> Readable for ReadSignal<T> {
    type Value = T;

    fn try_get(&self) -> Result<T> {
        ReadSignal::try_get(self)
    }

    fn try_get_untracked(&self) -> Result<T> {
        self.try_with_untracked(T::clone)
    }
}

impl<T> WriteSignal<T> {
    fn from_id(id: NodeId) -> Self {
        Self {
            id,
            ty: PhantomData,
        }
    }

    /// Arena handle of this signal.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Whether the signal has been disposed.
    pub fn is_disposed(&self) -> bool {
        !is_alive(self.id)
    }

    /// Release the signal. Both halves stop resolving; computations that read
    /// it keep their last value until they re-run.
    pub fn dispose(&self) {
        dispose_node(self.id);
    }
}

impl<T: Clone + 'static> WriteSignal<T> {
    /// Mutate the value in place and notify.
    pub fn try_update(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        let cell = cell::<T>(self.id, false)?;
        f(&mut cell.value.borrow_mut());

        with_runtime(|rt| {
            if let Some(node) = rt.nodes.get_mut(self.id) {
                node.version += 1;
            }
        });

        if !cell.subscribers.is_empty() {
            let snapshot = cell.value.borrow().clone();
            cell.subscribers.notify(&snapshot);
        }

        propagate(self.id);
        Ok(())
    }

    /// Replace the value and notify, or `Err` if the signal was disposed.
    pub fn try_set(&self, value: T) -> Result<()> {
        self.try_update(move |slot| *slot = value)
    }

    /// Set a new value and notify observers.
    ///
    /// This will trigger re-execution of all dependent computations.
    #[track_caller]
    pub fn set(&self, value: T) {
        self.try_set(value).unwrap_or_else(|err| panic!("{err}"));
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    #[track_caller]
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.try_update(f).unwrap_or_else(|err| panic!("{err}"));
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReadSignal<T> {}

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for WriteSignal<T> {}

impl<T> PartialEq for ReadSignal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ReadSignal<T> {}

impl<T> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<T> fmt::Debug for WriteSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteSignal")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
