//! Graph Nodes
//!
//! This module defines the node record shared by every reactive primitive and
//! the slot arena that stores them.
//!
//! # Handles
//!
//! Nodes reference each other through [`NodeId`]s: a slot index plus the
//! generation the slot had when the node was inserted. Removing a node bumps
//! the slot's generation, so every outstanding handle to it stops resolving.
//! Disposal is therefore a generation bump, and a stale handle can never alias
//! a node that later reuses the slot.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use smallvec::SmallVec;

/// Handle to a node in the [`Arena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// Slot index of this handle.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Unique identifier for a context key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a fresh context id.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A plain ownership scope created by `create_root`.
    Root,

    /// A source node. Signals have observers but no sources.
    Signal,

    /// A derived node. Memos have sources, observers, and a cached value.
    Memo,

    /// An effect whose first run is deferred to the microtask queue.
    Effect,

    /// An effect whose first run happens synchronously on creation.
    RenderEffect,
}

impl NodeKind {
    /// Whether nodes of this kind run a body and track sources.
    pub fn is_computation(self) -> bool {
        matches!(self, Self::Memo | Self::Effect | Self::RenderEffect)
    }

    /// Whether nodes of this kind are queued for execution when notified.
    pub fn is_eager(self) -> bool {
        matches!(self, Self::Effect | Self::RenderEffect)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Root => "owner",
            Self::Signal => "signal",
            Self::Memo => "memo",
            Self::Effect => "effect",
            Self::RenderEffect => "render effect",
        })
    }
}

/// Dirty state of a computation node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    /// The node's cached result reflects its sources.
    Clean,

    /// A source changed since the last run. Memos recompute on the next read.
    Dirty,
}

/// A deferred callback registered against an owner.
pub type Cleanup = Box<dyn FnOnce()>;

/// The body of a computation, type-erased.
///
/// Memo bodies write their result into the node's value cell themselves, so
/// the runner only ever needs to call this.
pub type Body = Rc<dyn Fn()>;

/// A node in the reactive graph.
///
/// A single record type covers every primitive; which fields are meaningful
/// depends on [`NodeKind`]:
///
/// | field                  | root | signal | memo | effect |
/// |------------------------|------|--------|------|--------|
/// | `parent`, `children`   | yes  |        | yes  | yes    |
/// | `cleanups`, `contexts` | yes  |        | yes  | yes    |
/// | `value`, `version`     |      | yes    | yes  |        |
/// | `observers`            |      | yes    | yes  |        |
/// | `sources`, `body`      |      |        | yes  | yes    |
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) dirty: DirtyState,
    pub(crate) scheduled: bool,
    pub(crate) version: u64,

    /// Owning scope. Signals record their creator here for diagnostics only.
    pub(crate) parent: Option<NodeId>,
    /// Owned scopes in creation order.
    pub(crate) children: SmallVec<[NodeId; 4]>,
    /// Callbacks to run on dispose or before the next run, in registration order.
    pub(crate) cleanups: SmallVec<[Cleanup; 2]>,
    /// Context values provided on this scope.
    pub(crate) contexts: HashMap<ContextId, Rc<dyn Any>>,

    /// Typed value cell, downcast by the typed handles.
    pub(crate) value: Option<Rc<dyn Any>>,
    /// Nodes read during the last run, in read order.
    pub(crate) sources: IndexSet<NodeId>,
    /// Computations that read this node during their last run.
    pub(crate) observers: IndexSet<NodeId>,
    pub(crate) body: Option<Body>,
}

impl Node {
    /// Create a new node of the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            // Computations start dirty so the first read or run computes.
            dirty: if kind.is_computation() {
                DirtyState::Dirty
            } else {
                DirtyState::Clean
            },
            scheduled: false,
            version: 0,
            parent: None,
            children: SmallVec::new(),
            cleanups: SmallVec::new(),
            contexts: HashMap::new(),
            value: None,
            sources: IndexSet::new(),
            observers: IndexSet::new(),
            body: None,
        }
    }

    /// Attach the typed value cell.
    pub fn with_value(mut self, value: Rc<dyn Any>) -> Self {
        self.value = Some(value);
        self
    }

    /// Attach the computation body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Set the owning scope and inherit the context values active on it.
    pub fn with_parent(mut self, parent: Option<NodeId>, contexts: HashMap<ContextId, Rc<dyn Any>>) -> Self {
        self.parent = parent;
        self.contexts = contexts;
        self
    }

    /// Get the node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Check if the node is clean.
    pub fn is_clean(&self) -> bool {
        self.dirty == DirtyState::Clean
    }

    /// Mark the node as needing to recompute.
    pub fn mark_dirty(&mut self) {
        self.dirty = DirtyState::Dirty;
    }

    /// Mark the node as up to date.
    pub fn mark_clean(&mut self) {
        self.dirty = DirtyState::Clean;
    }

    /// Record that this computation read `source` during its current run.
    pub fn add_source(&mut self, source: NodeId) {
        self.sources.insert(source);
    }

    /// Record that `observer` read this node during its current run.
    pub fn add_observer(&mut self, observer: NodeId) {
        self.observers.insert(observer);
    }

    /// Remove an observer, keeping the order of the rest.
    pub fn remove_observer(&mut self, observer: NodeId) {
        self.observers.shift_remove(&observer);
    }

    /// Remove an owned child, keeping the order of the rest.
    pub fn remove_child(&mut self, child: NodeId) {
        self.children.retain(|c| *c != child);
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind)
            .field("dirty", &self.dirty)
            .field("scheduled", &self.scheduled)
            .field("version", &self.version)
            .field("parent", &self.parent)
            .field("children", &self.children.len())
            .field("sources", &self.sources.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot storage with generation-checked handles.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Arena<T> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Insert a value, reusing a freed slot when one is available.
    pub fn insert(&mut self, value: T) -> NodeId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }

        let index = u32::try_from(self.slots.len()).expect("node arena exhausted");
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    /// Remove a value. Outstanding handles to it stop resolving.
    pub fn remove(&mut self, id: NodeId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(value)
    }

    /// Get a reference to a live value.
    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    /// Get a mutable reference to a live value.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    /// Check whether a handle still resolves.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the arena holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computations_start_dirty() {
        assert!(!Node::new(NodeKind::Memo).is_clean());
        assert!(!Node::new(NodeKind::Effect).is_clean());
        assert!(Node::new(NodeKind::Signal).is_clean());
        assert!(Node::new(NodeKind::Root).is_clean());
    }

    #[test]
    fn arena_insert_and_get() {
        let mut arena = Arena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");

        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.get(b), Some(&"b"));
    }

    #[test]
    fn removed_handles_do_not_alias_reused_slots() {
        let mut arena = Arena::new();
        let old = arena.insert(1);
        assert_eq!(arena.remove(old), Some(1));

        let new = arena.insert(2);
        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());

        assert_eq!(arena.get(old), None);
        assert_eq!(arena.get(new), Some(&2));
        assert_eq!(arena.remove(old), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn observers_keep_insertion_order() {
        let mut arena = Arena::new();
        let a = arena.insert(());
        let b = arena.insert(());
        let c = arena.insert(());

        let mut node = Node::new(NodeKind::Signal);
        node.add_observer(a);
        node.add_observer(b);
        node.add_observer(c);
        node.add_observer(a);
        node.remove_observer(b);

        assert_eq!(node.observers.iter().copied().collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn context_ids_are_unique() {
        assert_ne!(ContextId::new(), ContextId::new());
    }
}
