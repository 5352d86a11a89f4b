//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, effects,
//! and the ownership tree that scopes them. These primitives form the
//! foundation of Strand's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a running computation (such as a memo or effect), the signal
//! automatically registers that computation as an observer. When the signal's
//! value changes, all observers are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changed and somebody reads it.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, such as a view layer or a log.
//!
//! ## Owners
//!
//! Every memo and effect belongs to the owner that was current when it was
//! created. Disposing an owner disposes its subtree and runs the registered
//! cleanups; context values are looked up along the same tree.
//!
//! # Implementation Notes
//!
//! All state lives in a thread-local [`Runtime`]. A stack of running
//! computations tells a read which computation to register against; a write
//! marks what depends on it and flushes queued effects once the outermost
//! batch closes.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod batch;
mod context;
mod debounce;
mod effect;
mod memo;
mod owner;
mod resource;
pub(crate) mod runtime;
mod signal;
mod subscriber;
mod tracking;

pub use batch::{batch, batch_end, batch_start};
pub use context::{create_context, provide, try_use_context, use_context, Context};
pub use debounce::{debounced, DebouncedSetter};
pub use effect::{create_effect, create_render_effect, Effect};
pub use memo::{create_memo, Memo};
pub use owner::{
    create_root, get_owner, has_owner, on_cleanup, on_mount, run_with_owner, try_on_cleanup,
    Owner,
};
pub use resource::{
    create_deferred, create_resource, create_resource_with_source, Rejecter, Resolver, Resource,
    ResourceState,
};
pub use runtime::Runtime;
pub use signal::{create_signal, ReadSignal, WriteSignal};
pub use subscriber::{SubscriberId, Subscription};
pub use tracking::{is_tracking, peek, untrack, Readable};
