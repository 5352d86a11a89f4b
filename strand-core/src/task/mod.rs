//! Task Queues
//!
//! The reactive core has two suspension points, both owned by the runtime:
//!
//! - **Microtasks** run at the end of the current synchronous phase. The first
//!   run of `create_effect` and every `on_mount` callback are microtasks.
//! - **Timers** fire when the virtual clock passes their deadline. The
//!   debounced signal is built on them.
//!
//! Nothing here spawns threads or touches wall-clock time. The queues are
//! drained explicitly with [`tick`] and [`advance`], implicitly when the
//! outermost `create_root` returns, or by the async [`drive`] loop.

use std::collections::VecDeque;

use crate::reactive::runtime::with_runtime;

mod driver;
mod timer;

pub use driver::{drive, drive_for};
pub use timer::{TimerHandle, TimerQueue};

/// A queued callback.
pub type Task = Box<dyn FnOnce()>;

/// FIFO of callbacks waiting for the end of the synchronous phase.
#[derive(Default)]
pub struct Microtasks {
    queue: VecDeque<Task>,
}

impl Microtasks {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback.
    pub fn push(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Take the oldest callback.
    pub fn pop(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// Number of queued callbacks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Queue `task` to run at the next microtask boundary.
pub fn queue_microtask(task: impl FnOnce() + 'static) {
    with_runtime(|rt| rt.microtasks.push(Box::new(task)));
}

/// Run queued microtasks until the queue is empty, including microtasks
/// queued while draining. Returns how many ran.
///
/// A panicking microtask propagates; the ones behind it stay queued.
pub fn tick() -> usize {
    let mut ran = 0;
    while let Some(task) = with_runtime(|rt| rt.microtasks.pop()) {
        task();
        ran += 1;
    }
    ran
}

/// Arm a timer that runs `task` once `delay_ms` of virtual time has passed.
///
/// A zero delay still waits for the next [`advance`].
pub fn set_timeout(delay_ms: u64, task: impl FnOnce() + 'static) -> TimerHandle {
    with_runtime(|rt| rt.timers.schedule(delay_ms, Box::new(task)))
}

/// Cancel a timer. Returns `false` if it already fired or was cancelled.
pub fn clear_timeout(handle: TimerHandle) -> bool {
    // The cancelled closure is dropped after the runtime borrow ends.
    let task = with_runtime(|rt| rt.timers.cancel(handle));
    task.is_some()
}

/// Current virtual time in milliseconds.
pub fn now() -> u64 {
    with_runtime(|rt| rt.timers.now())
}

/// Deadline of the earliest armed timer, if any.
pub fn next_deadline() -> Option<u64> {
    with_runtime(|rt| rt.timers.next_deadline())
}

/// Whether both queues are empty.
pub fn is_idle() -> bool {
    with_runtime(|rt| rt.microtasks.is_empty() && rt.timers.is_empty())
}

/// Move the virtual clock forward by `ms`, firing every timer that becomes
/// due on the way in deadline order. Microtasks are drained after each timer
/// and once more at the end.
pub fn advance(ms: u64) {
    let target = now().saturating_add(ms);
    while let Some((deadline, task)) = with_runtime(|rt| rt.timers.pop_due(target)) {
        with_runtime(|rt| rt.timers.set_now(deadline));
        tracing::debug!(deadline, "timer fired");
        task();
        tick();
    }
    with_runtime(|rt| rt.timers.set_now(target));
    tick();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn microtasks_run_in_fifo_order_including_nested() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = log.clone();
        queue_microtask(move || {
            a.borrow_mut().push(1);
            let nested = a.clone();
            queue_microtask(move || nested.borrow_mut().push(3));
        });
        let b = log.clone();
        queue_microtask(move || b.borrow_mut().push(2));

        assert!(log.borrow().is_empty());
        assert_eq!(tick(), 3);
        assert_eq!(*log.borrow(), vec![1, 2, 3]);
        assert_eq!(tick(), 0);
    }

    #[test]
    fn advance_fires_exactly_at_the_deadline() {
        let fired = Rc::new(RefCell::new(None));
        let slot = fired.clone();
        let start = now();
        set_timeout(10, move || *slot.borrow_mut() = Some(now()));

        advance(9);
        assert!(fired.borrow().is_none());
        advance(1);
        assert_eq!(*fired.borrow(), Some(start + 10));
    }

    #[test]
    fn zero_delay_needs_a_tick_of_the_clock() {
        let fired = Rc::new(RefCell::new(false));
        let flag = fired.clone();
        set_timeout(0, move || *flag.borrow_mut() = true);

        tick();
        assert!(!*fired.borrow());
        advance(0);
        assert!(*fired.borrow());
    }

    #[test]
    fn clear_timeout_cancels() {
        let fired = Rc::new(RefCell::new(false));
        let flag = fired.clone();
        let handle = set_timeout(5, move || *flag.borrow_mut() = true);

        assert!(clear_timeout(handle));
        assert!(!clear_timeout(handle));
        advance(10);
        assert!(!*fired.borrow());
        assert!(is_idle());
    }
}
