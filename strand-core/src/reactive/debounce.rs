//! Debounced Signals
//!
//! A debounced pair sits in front of a signal's setter. Writes go to the
//! debounced setter, which waits until no write has arrived for `delay_ms`
//! of virtual time and only then publishes the last value.
//!
//! Only the trailing edge fires: a burst of writes produces one update,
//! carrying the final value.
//!
//! Publishing also forwards the value to the wrapped source setter, in the
//! same batch as the output write. This goes beyond a plain debounced view:
//! the source catches up with the settled value, so readers of either signal
//! agree once the delay has passed.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::task::{clear_timeout, set_timeout, TimerHandle};

use super::batch::batch;
use super::owner::try_on_cleanup;
use super::runtime::with_runtime;
use super::signal::{create_signal, ReadSignal, WriteSignal};

struct DebounceInner<T: 'static> {
    output: WriteSignal<T>,
    source: WriteSignal<T>,
    delay_ms: u64,
    pending: Cell<Option<TimerHandle>>,
}

impl<T: 'static> DebounceInner<T> {
    fn cancel(&self) -> bool {
        self.pending.take().is_some_and(clear_timeout)
    }
}

/// Setter half of a debounced signal.
pub struct DebouncedSetter<T: 'static> {
    inner: Rc<DebounceInner<T>>,
}

/// Debounce writes to `signal`.
///
/// Returns an output signal, initialized from the current value of `signal`,
/// and a setter. Each call to [`DebouncedSetter::set`] restarts the delay;
/// when it elapses the last value is written to the output signal and
/// forwarded to the wrapped setter. A delay of zero still waits for the
/// next timer turn.
///
/// The pending write is dropped when the current owner is disposed.
///
/// ```rust,ignore
/// let (query, set_query) = debounced(create_signal(String::new()), 250);
/// set_query.set("r".into());
/// set_query.set("ru".into());
/// advance(250);
/// assert_eq!(query.get(), "ru");
/// ```
pub fn debounced<T: Clone + 'static>(
    signal: (ReadSignal<T>, WriteSignal<T>),
    delay_ms: u64,
) -> (ReadSignal<T>, DebouncedSetter<T>) {
    let (source, set_source) = signal;
    let (output, set_output) = create_signal(source.get_untracked());
    let inner = Rc::new(DebounceInner {
        output: set_output,
        source: set_source,
        delay_ms,
        pending: Cell::new(None),
    });

    let weak = Rc::downgrade(&inner);
    let _ = try_on_cleanup(move || {
        if let Some(inner) = weak.upgrade() {
            inner.cancel();
        }
    });

    (output, DebouncedSetter { inner })
}

impl<T: Clone + 'static> DebouncedSetter<T> {
    /// Schedule `value` to be published after the delay, replacing any value
    /// still waiting.
    pub fn set(&self, value: T) {
        self.inner.cancel();

        let inner = self.inner.clone();
        let handle = set_timeout(self.inner.delay_ms, move || {
            inner.pending.set(None);
            batch(|| {
                // Either side may have been disposed in the meantime.
                let _ = inner.output.try_set(value.clone());
                let _ = inner.source.try_set(value);
            });
        });
        self.inner.pending.set(Some(handle));
    }
}

impl<T: 'static> DebouncedSetter<T> {
    /// Drop the value waiting to be published. Returns `false` if nothing
    /// was pending.
    pub fn cancel(&self) -> bool {
        self.inner.cancel()
    }

    /// Whether a value is waiting to be published.
    pub fn is_pending(&self) -> bool {
        self.inner
            .pending
            .get()
            .is_some_and(|handle| with_runtime(|rt| rt.timers.is_pending(handle)))
    }

    /// The configured delay in milliseconds.
    pub fn delay_ms(&self) -> u64 {
        self.inner.delay_ms
    }
}

impl<T: 'static> Clone for DebouncedSetter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for DebouncedSetter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebouncedSetter")
            .field("delay_ms", &self.inner.delay_ms)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_render_effect, create_root};
    use crate::task::advance;
    use std::cell::RefCell;

    #[test]
    fn only_the_last_value_is_published() {
        let (source, set_source) = create_signal(0);
        let (output, set_debounced) = debounced((source, set_source), 100);
        assert_eq!(output.get(), 0);

        set_debounced.set(1);
        advance(50);
        set_debounced.set(2);
        advance(99);
        assert_eq!(output.get(), 0);
        assert!(set_debounced.is_pending());

        advance(1);
        assert_eq!(output.get(), 2);
        assert_eq!(source.get(), 2);
        assert!(!set_debounced.is_pending());
    }

    #[test]
    fn one_update_per_burst() {
        let (source, set_source) = create_signal(String::new());
        let (output, set_debounced) = debounced((source, set_source), 10);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        create_render_effect(move || s.borrow_mut().push(output.get()));

        for text in ["r", "ru", "rus", "rust"] {
            set_debounced.set(text.to_string());
        }
        advance(10);

        assert_eq!(*seen.borrow(), vec!["", "rust"]);
    }

    #[test]
    fn zero_delay_waits_for_the_clock() {
        let (output, set_debounced) = debounced(create_signal(0), 0);
        set_debounced.set(1);
        assert_eq!(output.get(), 0);
        advance(0);
        assert_eq!(output.get(), 1);
    }

    #[test]
    fn cancel_drops_the_pending_value() {
        let (output, set_debounced) = debounced(create_signal(0), 5);
        set_debounced.set(1);
        assert!(set_debounced.cancel());
        assert!(!set_debounced.cancel());

        advance(10);
        assert_eq!(output.get(), 0);
    }

    #[test]
    fn owner_disposal_cancels_the_timer() {
        let (output, set_debounced, root) = create_root(|root| {
            let (output, set_debounced) = debounced(create_signal(0), 5);
            (output, set_debounced, root)
        });

        set_debounced.set(1);
        root.dispose();
        advance(10);

        assert_eq!(output.get(), 0);
        assert!(!set_debounced.is_pending());
    }
}
