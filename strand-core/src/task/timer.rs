//! Virtual Timer Queue
//!
//! Timers are ordered by deadline, then by the order they were armed, on a
//! millisecond clock owned by the runtime. The clock only moves when
//! [`advance`](super::advance) is called (directly, or by the async driver),
//! which keeps every timer-driven behavior deterministic under test.

use std::collections::{BTreeMap, HashMap};

use super::Task;

/// Handle returned by `set_timeout`, used to cancel the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Pending timers keyed by `(deadline, sequence)`.
#[derive(Default)]
pub struct TimerQueue {
    now: u64,
    next_seq: u64,
    timers: BTreeMap<(u64, u64), Task>,
    deadlines: HashMap<u64, u64>,
}

impl TimerQueue {
    /// Create an empty queue at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Move the clock forward. The clock never runs backwards.
    pub fn set_now(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    /// Arm a timer that becomes due `delay_ms` after the current time.
    pub fn schedule(&mut self, delay_ms: u64, task: Task) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;
        let deadline = self.now.saturating_add(delay_ms);
        self.timers.insert((deadline, seq), task);
        self.deadlines.insert(seq, deadline);
        TimerHandle(seq)
    }

    /// Cancel a timer and hand back its callback so the caller decides where
    /// it is dropped. `None` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<Task> {
        let deadline = self.deadlines.remove(&handle.0)?;
        self.timers.remove(&(deadline, handle.0))
    }

    /// Whether a timer is still armed.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    /// Deadline of the earliest armed timer.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove the earliest timer due at or before `until`.
    pub fn pop_due(&mut self, until: u64) -> Option<(u64, Task)> {
        let (&(deadline, seq), _) = self.timers.iter().next()?;
        if deadline > until {
            return None;
        }
        self.deadlines.remove(&seq);
        self.timers
            .remove(&(deadline, seq))
            .map(|task| (deadline, task))
    }

    /// Number of armed timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timer is armed.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Task) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let make = {
            let log = log.clone();
            move |name: &'static str| -> Task {
                let log = log.clone();
                Box::new(move || log.borrow_mut().push(name))
            }
        };
        (log, make)
    }

    #[test]
    fn timers_pop_in_deadline_then_arming_order() {
        let (log, task) = recorder();
        let mut queue = TimerQueue::new();
        queue.schedule(20, task("late"));
        queue.schedule(10, task("first"));
        queue.schedule(10, task("second"));

        assert_eq!(queue.next_deadline(), Some(10));
        while let Some((_, task)) = queue.pop_due(100) {
            task();
        }
        assert_eq!(*log.borrow(), vec!["first", "second", "late"]);
    }

    #[test]
    fn pop_due_respects_the_bound() {
        let (_, task) = recorder();
        let mut queue = TimerQueue::new();
        queue.schedule(5, task("x"));

        assert!(queue.pop_due(4).is_none());
        assert_eq!(queue.pop_due(5).map(|(deadline, _)| deadline), Some(5));
        assert!(queue.is_empty());
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let (_, task) = recorder();
        let mut queue = TimerQueue::new();
        let handle = queue.schedule(5, task("x"));

        assert!(queue.is_pending(handle));
        assert!(queue.cancel(handle).is_some());
        assert!(queue.cancel(handle).is_none());
        assert!(!queue.is_pending(handle));
        assert!(queue.pop_due(u64::MAX).is_none());
    }

    #[test]
    fn clock_is_monotonic() {
        let mut queue = TimerQueue::new();
        queue.set_now(10);
        queue.set_now(3);
        assert_eq!(queue.now(), 10);
    }
}
