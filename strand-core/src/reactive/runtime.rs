//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, memos, and
//! effects. It owns the node arena, the batch scheduler, the ownership and
//! tracking slots, and the task queues.
//!
//! # How It Works
//!
//! 1. Creating a primitive inserts a node into the arena. Owned nodes (roots,
//!    memos, effects) become children of the current owner.
//!
//! 2. When a signal or memo is read while a computation is running, the
//!    runtime records the edge in both directions.
//!
//! 3. When a signal is written, the runtime:
//!    a. Marks every memo reachable through observer edges as dirty
//!    b. Queues every reachable effect exactly once
//!    c. Flushes the queue unless a batch or a flush is already open
//!    d. Memos are lazy: they recompute when the queued effects read them
//!
//! 4. Running a computation first disposes what its previous run owned and
//!    detaches it from its previous sources, so dependencies are rebuilt from
//!    scratch on every run.
//!
//! # Threading
//!
//! The runtime is a thread-local. Handles are plain indices and carry no
//! thread affinity of their own, but a handle is only meaningful on the
//! thread that created it.
//!
//! The runtime is only ever borrowed for short, non-reentrant sections. User
//! closures always run with the borrow released, which is why the functions
//! below are split into "prepare", "call user code", "commit" phases.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use crate::config::RuntimeConfig;
use crate::error::{ReactiveError, Result};
use crate::graph::{Arena, BatchScheduler, Body, Cleanup, ContextId, Node, NodeId, NodeKind};
use crate::task::{tick, Microtasks, TimerQueue};

use super::tracking::{ObserverGuard, OwnerGuard};

thread_local! {
    static RUNTIME: RefCell<Runtime> = RefCell::new(Runtime::new(RuntimeConfig::default()));
}

/// Borrow the current thread's runtime for a short, non-reentrant section.
pub(crate) fn with_runtime<R>(f: impl FnOnce(&mut Runtime) -> R) -> R {
    RUNTIME.with(|rt| f(&mut rt.borrow_mut()))
}

type PanicPayload = Box<dyn Any + Send>;

/// The per-thread reactive runtime.
///
/// All state is reached through associated functions; there is no value to
/// construct or pass around.
pub struct Runtime {
    pub(crate) config: RuntimeConfig,
    pub(crate) nodes: Arena<Node>,
    pub(crate) scheduler: BatchScheduler,
    /// Scope that newly created owned nodes attach to.
    pub(crate) owner: Option<NodeId>,
    /// Computations currently executing, innermost last. `None` entries come
    /// from `untrack` and roots, and suppress dependency registration.
    pub(crate) tracking: Vec<Option<NodeId>>,
    pub(crate) microtasks: Microtasks,
    pub(crate) timers: TimerQueue,
}

impl Runtime {
    fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            nodes: Arena::new(),
            scheduler: BatchScheduler::new(),
            owner: None,
            tracking: Vec::new(),
            microtasks: Microtasks::new(),
            timers: TimerQueue::new(),
        }
    }

    /// Throw away every node, queue, and timer on this thread and start over
    /// with the current configuration.
    ///
    /// Handles created before the reset stop resolving. Must not be called
    /// from inside a reactive callback.
    pub fn reset() {
        let config = Self::config();
        Self::reset_with(config);
    }

    /// Like [`reset`](Self::reset), with a new configuration.
    pub fn reset_with(config: RuntimeConfig) {
        let previous = RUNTIME.with(|rt| rt.replace(Runtime::new(config)));
        // Dropping the old graph may run user destructors.
        drop(previous);
    }

    /// Replace the configuration, keeping all state.
    pub fn configure(config: RuntimeConfig) {
        with_runtime(|rt| rt.config = config);
    }

    /// Current configuration.
    pub fn config() -> RuntimeConfig {
        with_runtime(|rt| rt.config.clone())
    }

    /// Number of live nodes (owners, signals, memos, effects).
    pub fn node_count() -> usize {
        with_runtime(|rt| rt.nodes.len())
    }

    /// Number of effects waiting for the next flush.
    pub fn pending_count() -> usize {
        with_runtime(|rt| rt.scheduler.pending_len())
    }

    /// Current batch nesting depth.
    pub fn batch_depth() -> usize {
        with_runtime(|rt| rt.scheduler.depth())
    }

    // ------------------------------------------------------------------
    // Graph bookkeeping. None of these call user code.
    // ------------------------------------------------------------------

    /// The current owner, if it is still alive.
    pub(crate) fn current_owner(&self) -> Option<NodeId> {
        self.owner.filter(|id| self.nodes.contains(*id))
    }

    /// The computation that reads should register against.
    pub(crate) fn current_observer(&self) -> Option<NodeId> {
        self.tracking.last().copied().flatten()
    }

    /// Whether `id` is executing somewhere on the tracking stack.
    pub(crate) fn is_running(&self, id: NodeId) -> bool {
        self.tracking.contains(&Some(id))
    }

    /// No owner, no running computation, no batch and no flush: the point at
    /// which a synchronous construction phase is over.
    pub(crate) fn is_top_level(&self) -> bool {
        self.current_owner().is_none()
            && self.tracking.is_empty()
            && self.scheduler.depth() == 0
            && !self.scheduler.is_flushing()
    }

    /// Insert a node. Owned kinds are attached to the current owner and
    /// inherit the context values active on it.
    pub(crate) fn create_node(
        &mut self,
        kind: NodeKind,
        value: Option<Rc<dyn Any>>,
        body: Option<Body>,
    ) -> NodeId {
        let parent = self.current_owner();
        let contexts: HashMap<ContextId, Rc<dyn Any>> = match (kind, parent) {
            (NodeKind::Signal, _) | (_, None) => HashMap::new(),
            (_, Some(parent)) => self
                .nodes
                .get(parent)
                .map(|p| p.contexts.clone())
                .unwrap_or_default(),
        };

        let mut node = Node::new(kind).with_parent(parent, contexts);
        if let Some(value) = value {
            node = node.with_value(value);
        }
        if let Some(body) = body {
            node = node.with_body(body);
        }

        let id = self.nodes.insert(node);
        if kind != NodeKind::Signal {
            if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(p)) {
                parent.children.push(id);
            }
        }
        tracing::trace!(?id, %kind, ?parent, "created node");
        id
    }

    /// Record that the running computation read `source`.
    pub(crate) fn track(&mut self, source: NodeId) {
        let Some(observer) = self.current_observer() else {
            return;
        };
        if observer == source || !self.nodes.contains(observer) {
            return;
        }
        let Some(node) = self.nodes.get_mut(source) else {
            return;
        };
        node.add_observer(observer);
        if let Some(observer) = self.nodes.get_mut(observer) {
            observer.add_source(source);
        }
    }

    /// Push phase of a write: mark reachable memos dirty and queue reachable
    /// effects. Returns how many effects were newly queued.
    pub(crate) fn mark_observers(&mut self, source: NodeId) -> usize {
        let mut queue: VecDeque<NodeId> = self
            .nodes
            .get(source)
            .map(|node| node.observers.iter().copied().collect())
            .unwrap_or_default();
        let mut queued = 0;

        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            match node.kind {
                // A memo that is already dirty has notified its observers.
                NodeKind::Memo if node.is_clean() => {
                    node.mark_dirty();
                    queue.extend(node.observers.iter().copied());
                }
                kind if kind.is_eager() && !node.scheduled => {
                    node.scheduled = true;
                    self.scheduler.enqueue(id);
                    queued += 1;
                }
                _ => {}
            }
        }
        queued
    }

    /// Remove `source` from the observer sets of everything in `sources`.
    fn detach(&mut self, observer: NodeId, sources: impl IntoIterator<Item = NodeId>) {
        for source in sources {
            if let Some(node) = self.nodes.get_mut(source) {
                node.remove_observer(observer);
            }
        }
    }

    /// Take a node out of the graph entirely.
    fn release(&mut self, id: NodeId) -> Option<Node> {
        let mut node = self.nodes.remove(id)?;
        let sources = mem::take(&mut node.sources);
        self.detach(id, sources);
        self.scheduler.dequeue(id);
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(p)) {
            parent.remove_child(id);
        }
        // Context values stay on the node: the caller drops it unborrowed.
        Some(node)
    }

    /// Walk from the current owner up through parents looking for `id`.
    pub(crate) fn lookup_context(&self, id: ContextId) -> Option<Rc<dyn Any>> {
        let mut cursor = self.current_owner();
        while let Some(owner) = cursor {
            let node = self.nodes.get(owner)?;
            if let Some(value) = node.contexts.get(&id) {
                return Some(value.clone());
            }
            cursor = node.parent;
        }
        None
    }
}

// ----------------------------------------------------------------------------
// Operations that call user code
// ----------------------------------------------------------------------------

/// Resolve the typed value cell of a signal or memo, optionally registering
/// the read with the running computation.
pub(crate) fn value_cell<C: Any>(id: NodeId, kind: NodeKind, track: bool) -> Result<Rc<C>> {
    with_runtime(|rt| {
        let value = rt
            .nodes
            .get(id)
            .and_then(|node| node.value.clone())
            .ok_or(ReactiveError::Disposed(kind))?;
        if track {
            rt.track(id);
        }
        value.downcast::<C>().map_err(|_| ReactiveError::Disposed(kind))
    })
}

/// Whether a handle still resolves.
pub(crate) fn is_alive(id: NodeId) -> bool {
    with_runtime(|rt| rt.nodes.contains(id))
}

/// Report misuse according to the configured strictness.
pub(crate) fn report_misuse(err: ReactiveError) {
    if with_runtime(|rt| rt.config.strict_owners) {
        panic!("{err}");
    }
    tracing::warn!(%err, "ignoring call made without an owner");
}

/// Run callbacks in reverse registration order. Every callback runs even if
/// an earlier one panics; the first panic is returned.
fn run_cleanups(cleanups: impl DoubleEndedIterator<Item = Cleanup>) -> Option<PanicPayload> {
    let mut first_panic = None;
    for cleanup in cleanups.rev() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(cleanup)) {
            first_panic.get_or_insert(payload);
        }
    }
    first_panic
}

/// Marks a computation dirty again if its body unwinds.
struct RunGuard {
    id: NodeId,
    completed: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.completed {
            with_runtime(|rt| {
                if let Some(node) = rt.nodes.get_mut(self.id) {
                    node.mark_dirty();
                }
            });
        }
    }
}

/// Run a computation: clean up the previous run, rebuild its dependencies by
/// executing its body, commit.
///
/// Returns `Err(Cycle)` when the computation is already executing further
/// up the stack. Running a disposed computation is a no-op.
pub(crate) fn run_computation(id: NodeId) -> Result<()> {
    let prepared = with_runtime(|rt| {
        if rt.is_running(id) {
            let kind = rt.nodes.get(id).map_or(NodeKind::Memo, Node::kind);
            return Err(ReactiveError::Cycle(kind));
        }
        let Some(node) = rt.nodes.get_mut(id) else {
            return Ok(None);
        };
        node.scheduled = false;
        let children = mem::take(&mut node.children);
        let cleanups = mem::take(&mut node.cleanups);
        let sources = mem::take(&mut node.sources);
        let body = node.body.clone();
        let kind = node.kind;
        rt.detach(id, sources);
        Ok(Some((kind, children, cleanups, body)))
    })?;
    let Some((kind, children, cleanups, body)) = prepared else {
        return Ok(());
    };

    // Whatever the previous run owned goes first, newest child first.
    let mut first_panic = None;
    for child in children.into_iter().rev() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| dispose_node(child))) {
            first_panic.get_or_insert(payload);
        }
    }
    if let Some(payload) = run_cleanups(cleanups.into_iter()) {
        first_panic.get_or_insert(payload);
    }
    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }

    // A cleanup may have disposed the computation itself.
    let Some(body) = body.filter(|_| is_alive(id)) else {
        return Ok(());
    };

    tracing::trace!(?id, %kind, "running computation");
    {
        let mut guard = RunGuard {
            id,
            completed: false,
        };
        with_runtime(|rt| {
            if let Some(node) = rt.nodes.get_mut(id) {
                // Clean before the body runs: a write the body makes to one of
                // its own sources leaves the node dirty again.
                node.mark_clean();
            }
        });
        let _owner = OwnerGuard::enter(Some(id));
        let _observer = ObserverGuard::enter(Some(id));
        body();
        guard.completed = true;
    }

    with_runtime(|rt| {
        if let Some(node) = rt.nodes.get_mut(id) {
            node.version += 1;
        }
    });
    Ok(())
}

/// Dispose a node and everything it owns.
///
/// Children go first in reverse creation order, then the node's own cleanups
/// in reverse registration order, then its context values; finally the slot
/// is freed. Disposing an already disposed node is a no-op.
pub(crate) fn dispose_node(id: NodeId) {
    let taken = with_runtime(|rt| {
        let node = rt.nodes.get_mut(id)?;
        node.scheduled = false;
        let kind = node.kind;
        let children = mem::take(&mut node.children);
        let cleanups = mem::take(&mut node.cleanups);
        rt.scheduler.dequeue(id);
        Some((kind, children, cleanups))
    });
    let Some((kind, children, cleanups)) = taken else {
        return;
    };
    tracing::trace!(?id, %kind, "disposing node");

    let mut first_panic = None;
    for child in children.into_iter().rev() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| dispose_node(child))) {
            first_panic.get_or_insert(payload);
        }
    }
    if let Some(payload) = run_cleanups(cleanups.into_iter()) {
        first_panic.get_or_insert(payload);
    }

    // The released node carries user closures and context values, drop them
    // with the borrow released.
    let released = with_runtime(|rt| rt.release(id));
    drop(released);

    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }
}

/// Push phase of a write followed by a flush when no batch is open.
pub(crate) fn propagate(source: NodeId) {
    let queued = with_runtime(|rt| rt.mark_observers(source));
    if queued > 0 {
        tracing::trace!(?source, queued, "queued effects");
    }
    flush();
}

/// Drain the pending queue if no batch or flush is open.
///
/// Each entry is isolated: a panicking effect does not keep the others from
/// running. The first panic is re-raised once the queue is empty.
pub(crate) fn flush() {
    let started = with_runtime(|rt| rt.scheduler.should_flush() && rt.scheduler.begin_flush());
    if !started {
        return;
    }

    struct Flushing;
    impl Drop for Flushing {
        fn drop(&mut self) {
            with_runtime(|rt| rt.scheduler.end_flush());
        }
    }
    let flushing = Flushing;

    let limit = with_runtime(|rt| rt.config.max_flush_runs);
    let mut runs = 0usize;
    let mut first_panic: Option<PanicPayload> = None;

    while let Some(id) = with_runtime(|rt| rt.scheduler.next()) {
        let scheduled = with_runtime(|rt| rt.nodes.get(id).is_some_and(|node| node.scheduled));
        if !scheduled {
            continue;
        }

        if runs == limit {
            let dropped = with_runtime(|rt| {
                let mut dropped = rt.scheduler.drain();
                dropped.push(id);
                for id in &dropped {
                    if let Some(node) = rt.nodes.get_mut(*id) {
                        node.scheduled = false;
                    }
                }
                dropped.len()
            });
            let err = ReactiveError::FlushOverflow(limit);
            tracing::error!(limit, dropped, "aborting flush: {err}");
            first_panic.get_or_insert_with(|| Box::new(err.to_string()) as PanicPayload);
            break;
        }
        runs += 1;

        match panic::catch_unwind(AssertUnwindSafe(|| run_computation(id))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(?id, %err, "skipped computation"),
            Err(payload) => {
                tracing::debug!(?id, "computation panicked during flush");
                first_panic.get_or_insert(payload);
            }
        }
    }

    drop(flushing);
    tracing::debug!(runs, "flush complete");

    if let Some(payload) = first_panic {
        panic::resume_unwind(payload);
    }

    // A flush nothing encloses ends the synchronous phase: effects created
    // by the runs above get their first run before the write returns.
    if runs > 0 && with_runtime(|rt| rt.is_top_level()) {
        tick();
    }
}

/// Run `f` inside a batch, flushing once when the outermost batch closes.
pub(crate) fn run_updates<R>(f: impl FnOnce() -> R) -> R {
    struct Batch;
    impl Drop for Batch {
        fn drop(&mut self) {
            with_runtime(|rt| rt.scheduler.end());
        }
    }

    with_runtime(|rt| rt.scheduler.start());
    let result = {
        let _batch = Batch;
        f()
    };
    flush();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insert(kind: NodeKind) -> NodeId {
        with_runtime(|rt| rt.create_node(kind, None, None))
    }

    #[test]
    fn owned_nodes_attach_to_the_current_owner() {
        let root = insert(NodeKind::Root);
        let child = {
            let _owner = OwnerGuard::enter(Some(root));
            insert(NodeKind::Effect)
        };
        let signal = {
            let _owner = OwnerGuard::enter(Some(root));
            insert(NodeKind::Signal)
        };

        with_runtime(|rt| {
            let root = rt.nodes.get(root).unwrap();
            assert_eq!(root.children.as_slice(), &[child]);
            assert!(!root.children.contains(&signal));
        });
    }

    #[test]
    fn track_links_both_directions() {
        let signal = insert(NodeKind::Signal);
        let effect = insert(NodeKind::Effect);

        {
            let _observer = ObserverGuard::enter(Some(effect));
            with_runtime(|rt| rt.track(signal));
        }

        with_runtime(|rt| {
            assert!(rt.nodes.get(signal).unwrap().observers.contains(&effect));
            assert!(rt.nodes.get(effect).unwrap().sources.contains(&signal));
        });
    }

    #[test]
    fn untracked_reads_do_not_link() {
        let signal = insert(NodeKind::Signal);
        let effect = insert(NodeKind::Effect);

        {
            let _observer = ObserverGuard::enter(Some(effect));
            let _untracked = ObserverGuard::enter(None);
            with_runtime(|rt| rt.track(signal));
        }

        with_runtime(|rt| assert!(rt.nodes.get(signal).unwrap().observers.is_empty()));
    }

    #[test]
    fn mark_observers_queues_each_effect_once() {
        let signal = insert(NodeKind::Signal);
        let memo = insert(NodeKind::Memo);
        let effect = insert(NodeKind::Effect);

        with_runtime(|rt| {
            rt.nodes.get_mut(memo).unwrap().mark_clean();
            rt.nodes.get_mut(signal).unwrap().add_observer(memo);
            rt.nodes.get_mut(signal).unwrap().add_observer(effect);
            rt.nodes.get_mut(memo).unwrap().add_observer(effect);

            assert_eq!(rt.mark_observers(signal), 1);
            assert!(!rt.nodes.get(memo).unwrap().is_clean());
            assert!(rt.nodes.get(effect).unwrap().scheduled);
            assert_eq!(rt.scheduler.pending_len(), 1);
            assert_eq!(rt.mark_observers(signal), 0);
            rt.scheduler.drain();
        });
    }

    #[test]
    fn dispose_frees_the_subtree() {
        let root = insert(NodeKind::Root);
        let (child, grandchild) = {
            let _owner = OwnerGuard::enter(Some(root));
            let child = insert(NodeKind::Root);
            let _inner = OwnerGuard::enter(Some(child));
            (child, insert(NodeKind::Effect))
        };

        dispose_node(root);

        assert!(!is_alive(root));
        assert!(!is_alive(child));
        assert!(!is_alive(grandchild));
    }

    #[test]
    fn contexts_are_inherited_at_creation() {
        let key = ContextId::new();
        let root = insert(NodeKind::Root);
        with_runtime(|rt| {
            rt.nodes
                .get_mut(root)
                .unwrap()
                .contexts
                .insert(key, Rc::new(7_i32) as Rc<dyn Any>);
        });

        let child = {
            let _owner = OwnerGuard::enter(Some(root));
            insert(NodeKind::Memo)
        };
        with_runtime(|rt| rt.nodes.get_mut(root).unwrap().contexts.clear());

        let _owner = OwnerGuard::enter(Some(child));
        let found = with_runtime(|rt| rt.lookup_context(key)).unwrap();
        assert_eq!(found.downcast_ref::<i32>(), Some(&7));
    }

    #[test]
    fn reset_drops_all_state() {
        insert(NodeKind::Root);
        assert!(Runtime::node_count() > 0);
        Runtime::reset();
        assert_eq!(Runtime::node_count(), 0);
    }
}
