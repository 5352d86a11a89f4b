//! Strand Core
//!
//! This crate provides the reactive core of the Strand UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, memos, effects)
//! - An ownership tree for cleanup and scoped context values
//! - Batched, glitch-free update propagation
//! - Resources and debounced signals on top of a virtual clock
//!
//! Rendering, list reconciliation, and I/O live outside this crate; they talk
//! to it only through the primitives re-exported below.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives, dependency tracking, and the runtime
//! - `graph`: Node arena and batch scheduler behind the runtime
//! - `task`: Microtask queue, virtual timers, and the tokio driver
//! - `config`: Runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use strand_core::{create_effect, create_memo, create_root, create_signal};
//!
//! let (count, set_count) = create_signal(0);
//!
//! let root = create_root(|root| {
//!     // Create a derived value
//!     let doubled = create_memo(move || count.get() * 2);
//!
//!     // Create an effect
//!     create_effect(move || {
//!         println!("Count: {}, Doubled: {}", count.get(), doubled.get());
//!     });
//!     root
//! }); // Prints: "Count: 0, Doubled: 0"
//!
//! // Update the signal
//! set_count.set(5);
//! // Effect automatically runs, prints: "Count: 5, Doubled: 10"
//!
//! root.dispose();
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod task;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{
    batch, batch_end, batch_start, create_context, create_deferred, create_effect, create_memo,
    create_render_effect, create_resource, create_resource_with_source, create_root,
    create_signal, debounced, get_owner, has_owner, is_tracking, on_cleanup, on_mount, peek,
    provide, run_with_owner, try_on_cleanup, try_use_context, untrack, use_context, Context,
    DebouncedSetter, Effect, Memo, Owner, ReadSignal, Readable, Rejecter, Resolver, Resource,
    ResourceState, Runtime, Subscription, WriteSignal,
};
pub use task::{
    advance, clear_timeout, drive, drive_for, now, queue_microtask, set_timeout, tick,
    TimerHandle,
};
