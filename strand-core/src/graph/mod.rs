//! Dependency Graph
//!
//! This module holds the data structures behind the reactive runtime: the
//! node arena and the batch scheduler.
//!
//! # Overview
//!
//! The dependency graph is a directed graph where:
//!
//! - Nodes represent signals, memos, effects, and plain ownership roots
//! - Source edges point from a computation to what it read last run
//! - Observer edges point back from a signal or memo to its readers
//! - Ownership edges form a separate tree used for disposal and context
//!
//! Both directions of the dependency edges are kept so a write can find its
//! observers in O(observers) and a re-run can detach from its sources in
//! O(sources).
//!
//! # Design Decisions
//!
//! 1. All nodes live in one arena and reference each other by generation-checked
//!    index, so the cyclic signal/computation references never become owning
//!    pointers.
//!
//! 2. The graph does not run user code. Everything that calls back into user
//!    closures lives in `reactive::runtime`, which borrows the graph only
//!    between those calls.

mod node;
mod scheduler;

pub use node::{Arena, Body, Cleanup, ContextId, DirtyState, Node, NodeId, NodeKind};
pub use scheduler::BatchScheduler;
