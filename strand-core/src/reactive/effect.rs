//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect is attached to the current owner. Its first
//!    run happens at the next microtask boundary (`create_effect`) or right
//!    away (`create_render_effect`).
//!
//! 2. Every run tracks the signals and memos it reads. When any of them
//!    changes, the effect is queued and runs once in the next flush, however
//!    many of its dependencies changed.
//!
//! 3. Before re-running, the effect disposes whatever its previous run
//!    created, runs the cleanups that run registered, and forgets its old
//!    dependencies. Only what the new run reads is tracked.
//!
//! # Use Cases
//!
//! Effects are used to synchronize reactive state with the outside world:
//!
//! - Updating a view when state changes
//! - Logging state changes
//! - Starting and stopping timers
//!
//! # Differences from Memo
//!
//! - Memos return a value; effects do not.
//! - Memos are lazy (compute on access); effects are eager (run when deps change).
//! - Memos cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! Call `on_cleanup` inside the body to register teardown. It runs before the
//! next run of the effect and when the effect is disposed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::graph::{Body, NodeId, NodeKind};
use crate::task::queue_microtask;

use super::runtime::{dispose_node, is_alive, run_computation, run_updates, with_runtime};

/// Handle to a running effect.
///
/// Dropping the handle does not stop the effect; it lives until [`dispose`]
/// is called or its owner is disposed.
///
/// [`dispose`]: Effect::dispose
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    id: NodeId,
}

/// Create an effect whose first run is deferred to the next microtask
/// boundary: after the current `create_root` returns, after the write whose
/// flush created it, or at the next `tick`.
///
/// # Example
///
/// ```rust,ignore
/// let (count, set_count) = create_signal(0);
///
/// create_root(|_| {
///     create_effect(move || println!("Count is: {}", count.get()));
/// }); // Prints: "Count is: 0"
///
/// set_count.set(5); // Prints: "Count is: 5"
/// ```
pub fn create_effect(run: impl FnMut() + 'static) -> Effect {
    let effect = Effect {
        id: create_computation(NodeKind::Effect, run),
    };
    queue_microtask(move || {
        if !effect.is_disposed() {
            run_updates(|| execute(effect.id));
        }
    });
    effect
}

/// Create an effect whose first run happens before this returns.
///
/// Writes made by the first run are batched and flushed once it completes.
pub fn create_render_effect(run: impl FnMut() + 'static) -> Effect {
    let effect = Effect {
        id: create_computation(NodeKind::RenderEffect, run),
    };
    run_updates(|| execute(effect.id));
    effect
}

fn create_computation(kind: NodeKind, run: impl FnMut() + 'static) -> NodeId {
    let run = RefCell::new(run);
    // The runner refuses to re-enter a computation, so the borrow is never
    // contended.
    let body: Body = Rc::new(move || {
        let mut run = run.borrow_mut();
        (*run)()
    });

    with_runtime(|rt| {
        if rt.current_owner().is_none() {
            tracing::debug!(%kind, "effect created without an owner; it lives until disposed");
        }
        rt.create_node(kind, None, Some(body))
    })
}

fn execute(id: NodeId) {
    if let Err(err) = run_computation(id) {
        tracing::warn!(?id, %err, "skipped effect run");
    }
}

impl Effect {
    /// Arena handle of this effect.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Dispose of the effect.
    ///
    /// Its cleanups run and it will not run again.
    pub fn dispose(&self) {
        dispose_node(self.id);
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        !is_alive(self.id)
    }

    /// Get the number of times the effect has run to completion.
    pub fn run_count(&self) -> u64 {
        with_runtime(|rt| rt.nodes.get(self.id).map_or(0, |node| node.version))
    }

    /// Get the number of dependencies tracked by the last run.
    pub fn dependency_count(&self) -> usize {
        with_runtime(|rt| rt.nodes.get(self.id).map_or(0, |node| node.sources.len()))
    }

    /// Whether the effect is queued for the next flush.
    pub fn is_scheduled(&self) -> bool {
        with_runtime(|rt| rt.nodes.get(self.id).is_some_and(|node| node.scheduled))
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
