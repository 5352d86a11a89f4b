//! Error Types
//!
//! Every fallible operation in the reactive core reports a [`ReactiveError`].
//! The convenience accessors (`get`, `set`, `on_cleanup` in strict mode, ...)
//! panic with the error's message instead, because these failures point at a
//! lifecycle bug in the calling code rather than at a recoverable condition.
//!
//! Resource rejection is deliberately *not* an error here: it is a regular
//! state transition of the resource (see `ResourceState::Errored`).

use crate::graph::NodeKind;

/// Errors raised by the reactive runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactiveError {
    /// An owner-scoped operation was called with no current owner.
    #[error("`{0}` called outside of a reactive owner")]
    NoOwner(&'static str),

    /// The handle points at a node that has been disposed.
    #[error("{0} has been disposed")]
    Disposed(NodeKind),

    /// A computation was asked to run while it was already running.
    #[error("cycle detected: a {0} read itself while computing")]
    Cycle(NodeKind),

    /// A single flush ran more computations than the configured limit.
    #[error(
        "update flush exceeded {0} computation runs; \
         an effect is probably writing to a signal it reads"
    )]
    FlushOverflow(usize),
}

/// Result alias used throughout the crate.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
