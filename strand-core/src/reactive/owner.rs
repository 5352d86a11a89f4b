//! Ownership Tree
//!
//! Every memo, effect, and root is owned by the scope that was current when it
//! was created. Disposing a scope disposes everything below it, so the
//! lifetime of a reactive subtree is tied to one handle.
//!
//! # Disposal Order
//!
//! For a scope being disposed:
//!
//! 1. Children are disposed, newest first (recursively, depth-first).
//! 2. The scope's cleanups run, newest first.
//! 3. Context values provided on the scope are dropped.
//! 4. The slot is freed; every handle to the scope now reports it disposed.
//!
//! A computation is also a scope. Before each re-run it goes through steps 1
//! and 2, which is what makes `on_cleanup` inside an effect run before the
//! effect's next run.

use crate::error::{ReactiveError, Result};
use crate::graph::{NodeId, NodeKind};
use crate::task::{queue_microtask, tick};

use super::batch::batch;
use super::runtime::{dispose_node, is_alive, report_misuse, with_runtime};
use super::tracking::{ObserverGuard, OwnerGuard};

/// Handle to an ownership scope.
///
/// Roots, memos, and effects are all owners; [`get_owner`] returns whichever
/// one is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Owner {
    id: NodeId,
}

impl Owner {
    pub(crate) fn from_id(id: NodeId) -> Self {
        Self { id }
    }

    /// Arena handle of this scope.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dispose this scope and everything it owns. Idempotent.
    pub fn dispose(&self) {
        dispose_node(self.id);
    }

    /// Whether the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        !is_alive(self.id)
    }

    /// The scope this one was created under, if it is still alive.
    pub fn parent(&self) -> Option<Owner> {
        with_runtime(|rt| {
            rt.nodes
                .get(self.id)
                .and_then(|node| node.parent)
                .filter(|parent| rt.nodes.contains(*parent))
                .map(Owner::from_id)
        })
    }

    /// Number of live scopes directly owned by this one.
    pub fn child_count(&self) -> usize {
        with_runtime(|rt| rt.nodes.get(self.id).map_or(0, |node| node.children.len()))
    }
}

/// Create a new ownership scope and run `f` inside it.
///
/// The scope is a child of the current owner, if there is one. Reads inside
/// `f` are not tracked by any enclosing computation. The scope lives until
/// `dispose` is called on the handle passed to `f` (or until its parent is
/// disposed).
///
/// When this is the outermost scope on the stack, queued microtasks (first
/// runs of `create_effect`, `on_mount` callbacks) run before this returns.
///
/// ```rust,ignore
/// let (count, set_count) = create_signal(0);
/// let dispose = create_root(|root| {
///     create_effect(move || println!("count = {}", count.get()));
///     root
/// });
/// set_count.set(1);
/// dispose.dispose();
/// ```
pub fn create_root<R>(f: impl FnOnce(Owner) -> R) -> R {
    let (id, top_level) = with_runtime(|rt| {
        let top_level = rt.is_top_level();
        (rt.create_node(NodeKind::Root, None, None), top_level)
    });

    let result = {
        let _owner = OwnerGuard::enter(Some(id));
        let _untracked = ObserverGuard::enter(None);
        f(Owner::from_id(id))
    };

    if top_level {
        tick();
    }
    result
}

/// The current owner, if any.
pub fn get_owner() -> Option<Owner> {
    with_runtime(|rt| rt.current_owner()).map(Owner::from_id)
}

/// Whether there is a live current owner.
pub fn has_owner() -> bool {
    get_owner().is_some()
}

/// Run `f` with `owner` as the current owner, then restore the previous one.
///
/// This is how work that resumes later (a timer callback, a resolved fetch)
/// attaches the computations it creates to the right scope. Reads inside `f`
/// are untracked.
pub fn run_with_owner<R>(owner: Owner, f: impl FnOnce() -> R) -> Result<R> {
    if owner.is_disposed() {
        return Err(ReactiveError::Disposed(NodeKind::Root));
    }
    let _owner = OwnerGuard::enter(Some(owner.id));
    let _untracked = ObserverGuard::enter(None);
    Ok(f())
}

/// Register `f` to run when the current owner is disposed, or before the
/// current computation runs again.
///
/// Without an owner this logs a warning and drops `f`, or panics when
/// `RuntimeConfig::strict_owners` is set.
pub fn on_cleanup(f: impl FnOnce() + 'static) {
    if let Err(err) = try_on_cleanup(f) {
        report_misuse(err);
    }
}

/// Like [`on_cleanup`], returning the error instead of applying the
/// configured misuse policy.
pub fn try_on_cleanup(f: impl FnOnce() + 'static) -> Result<()> {
    with_runtime(|rt| {
        let owner = rt
            .current_owner()
            .ok_or(ReactiveError::NoOwner("on_cleanup"))?;
        if let Some(node) = rt.nodes.get_mut(owner) {
            node.cleanups.push(Box::new(f));
        }
        Ok(())
    })
}

/// Run `f` once, at the next microtask boundary, under the current owner.
///
/// Reads inside `f` are untracked and writes are batched. If the owner is
/// disposed before the microtask runs, `f` is dropped without running.
pub fn on_mount(f: impl FnOnce() + 'static) {
    let Some(owner) = get_owner() else {
        report_misuse(ReactiveError::NoOwner("on_mount"));
        return;
    };
    queue_microtask(move || {
        if run_with_owner(owner, || batch(f)).is_err() {
            tracing::trace!(owner = ?owner.id, "owner disposed before mount");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::reactive::Runtime;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn root_is_current_inside_and_gone_after() {
        assert!(!has_owner());
        let root = create_root(|root| {
            assert_eq!(get_owner(), Some(root));
            root
        });
        assert!(!has_owner());
        assert!(!root.is_disposed());

        root.dispose();
        assert!(root.is_disposed());
    }

    #[test]
    fn nested_roots_are_children() {
        create_root(|outer| {
            let inner = create_root(|inner| inner);
            assert_eq!(inner.parent(), Some(outer));
            assert_eq!(outer.child_count(), 1);

            outer.dispose();
            assert!(inner.is_disposed());
        });
    }

    #[test]
    fn disposal_runs_children_then_own_cleanups_lifo() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = create_root(|root| {
            let l = log.clone();
            on_cleanup(move || l.borrow_mut().push("root 1"));
            for name in ["child a", "child b"] {
                let l = log.clone();
                create_root(move |_| on_cleanup(move || l.borrow_mut().push(name)));
            }
            let l = log.clone();
            on_cleanup(move || l.borrow_mut().push("root 2"));
            root
        });

        root.dispose();
        assert_eq!(
            *log.borrow(),
            vec!["child b", "child a", "root 2", "root 1"]
        );
    }

    #[test]
    fn dispose_is_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let root = create_root(|root| {
            let count = count.clone();
            on_cleanup(move || *count.borrow_mut() += 1);
            root
        });

        root.dispose();
        root.dispose();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn run_with_owner_attaches_late_work() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let root = create_root(|root| root);

        let l = log.clone();
        run_with_owner(root, move || on_cleanup(move || l.borrow_mut().push("late")))
            .unwrap();
        assert!(!has_owner());

        root.dispose();
        assert_eq!(*log.borrow(), vec!["late"]);
        assert_eq!(
            run_with_owner(root, || ()),
            Err(ReactiveError::Disposed(NodeKind::Root))
        );
    }

    #[test]
    fn cleanup_without_owner_is_reported() {
        assert_eq!(
            try_on_cleanup(|| ()),
            Err(ReactiveError::NoOwner("on_cleanup"))
        );
        // Lenient by default: logged and dropped.
        on_cleanup(|| ());
    }

    #[test]
    #[should_panic(expected = "`on_cleanup` called outside of a reactive owner")]
    fn strict_mode_panics_without_owner() {
        Runtime::reset_with(RuntimeConfig::default().with_strict_owners(true));
        on_cleanup(|| ());
    }

    #[test]
    fn on_mount_runs_once_after_construction() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        create_root(move |_| {
            let mounted = l.clone();
            on_mount(move || mounted.borrow_mut().push("mounted"));
            l.borrow_mut().push("constructed");
        });

        assert_eq!(*log.borrow(), vec!["constructed", "mounted"]);
        assert_eq!(tick(), 0);
    }

    #[test]
    fn on_mount_is_skipped_for_disposed_owners() {
        let mounted = Rc::new(RefCell::new(false));
        let flag = mounted.clone();
        let root = Owner::from_id(with_runtime(|rt| {
            rt.create_node(NodeKind::Root, None, None)
        }));

        run_with_owner(root, move || on_mount(move || *flag.borrow_mut() = true)).unwrap();
        root.dispose();
        tick();

        assert!(!*mounted.borrow());
    }
}
