//! Low-level Subscribers
//!
//! A subscriber is a plain callback attached to one signal. It runs on every
//! write, outside the computation machinery: no tracking, no batching, no
//! ownership. This is the escape hatch for bridging signals into code that
//! is not reactive itself.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

type Callback<T> = Rc<dyn Fn(&T)>;

/// The callbacks attached to one signal, in subscription order.
pub(crate) struct Subscribers<T> {
    entries: RefCell<Vec<(SubscriberId, Callback<T>)>>,
}

impl<T> Subscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, callback: impl Fn(&T) + 'static) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Call every callback with `value`. Callbacks may subscribe or
    /// unsubscribe while this runs; changes apply from the next call.
    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }
}

/// Anything a [`Subscription`] can detach itself from.
pub(crate) trait Unsubscribe {
    fn unsubscribe(&self, id: SubscriberId) -> bool;
}

/// Handle returned by `ReadSignal::subscribe`.
///
/// Dropping the handle does not unsubscribe; call
/// [`unsubscribe`](Self::unsubscribe).
pub struct Subscription {
    id: SubscriberId,
    target: Weak<dyn Unsubscribe>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, target: Weak<dyn Unsubscribe>) -> Self {
        Self { id, target }
    }

    /// The subscriber's unique ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Detach the callback. Returns `false` if it was already detached or the
    /// signal is gone.
    pub fn unsubscribe(&self) -> bool {
        self.target
            .upgrade()
            .is_some_and(|target| target.unsubscribe(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &(self.target.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn notify_calls_every_callback_in_order() {
        let subscribers = Subscribers::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let log = log.clone();
            subscribers.add(move |v: &i32| log.borrow_mut().push(format!("{tag}{v}")));
        }

        subscribers.notify(&1);
        assert_eq!(*log.borrow(), vec!["a1", "b1"]);
    }

    #[test]
    fn removed_callbacks_stop_firing() {
        let subscribers = Subscribers::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let id = subscribers.add(move |_: &()| c.set(c.get() + 1));

        subscribers.notify(&());
        assert!(subscribers.remove(id));
        assert!(!subscribers.remove(id));
        subscribers.notify(&());

        assert_eq!(calls.get(), 1);
        assert!(subscribers.is_empty());
    }
}
