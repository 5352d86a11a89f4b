//! Batch Scheduler
//!
//! The scheduler holds the queue of effects waiting to run and decides when
//! that queue is flushed.
//!
//! # Algorithm
//!
//! 1. Every write marks the effects it reaches as scheduled and appends them
//!    to `pending`. An effect already in `pending` keeps its position.
//! 2. Writes made while `depth > 0` (inside a batch) only enqueue.
//! 3. When the outermost batch ends, or a write happens at depth zero, the
//!    runtime drains `pending` front to back. Effects enqueued while the
//!    drain is running are appended and picked up by the same drain.
//! 4. Only one drain runs at a time: a flush requested while `flushing` is
//!    set is absorbed by the drain already in progress.
//!
//! The drain loop itself lives in the runtime because it calls back into
//! user code; this type only owns the bookkeeping.

use indexmap::IndexSet;

use super::node::NodeId;

/// Depth counter and pending queue for batched updates.
#[derive(Debug, Default)]
pub struct BatchScheduler {
    depth: usize,
    pending: IndexSet<NodeId>,
    flushing: bool,
}

impl BatchScheduler {
    /// Create an idle scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a batch.
    pub fn start(&mut self) {
        self.depth += 1;
    }

    /// Leave a batch. Returns `true` when the outermost batch ended.
    pub fn end(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.depth == 0
    }

    /// Current batch nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether writes should flush right away.
    pub fn should_flush(&self) -> bool {
        self.depth == 0 && !self.flushing
    }

    /// Queue a computation. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, id: NodeId) -> bool {
        self.pending.insert(id)
    }

    /// Remove a computation from the queue, e.g. because it was disposed.
    pub fn dequeue(&mut self, id: NodeId) {
        self.pending.shift_remove(&id);
    }

    /// Take the oldest queued computation.
    pub fn next(&mut self) -> Option<NodeId> {
        self.pending.shift_remove_index(0)
    }

    /// Drop everything that is queued and return it.
    pub fn drain(&mut self) -> Vec<NodeId> {
        self.pending.drain(..).collect()
    }

    /// Number of queued computations.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Mark the start of a drain. Returns `false` if one is already running.
    pub fn begin_flush(&mut self) -> bool {
        !std::mem::replace(&mut self.flushing, true)
    }

    /// Mark the end of a drain.
    pub fn end_flush(&mut self) {
        self.flushing = false;
    }

    /// Whether a drain is running.
    pub fn is_flushing(&self) -> bool {
        self.flushing
    }
}
