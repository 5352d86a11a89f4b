//! Scoped Context Values
//!
//! A context is a typed key with a default value. [`provide`] binds a value to
//! the key on the current owner for the duration of a closure; [`use_context`]
//! finds the nearest binding by walking up the ownership tree.
//!
//! # Implementation
//!
//! Bindings are stored on owner nodes. A new root, memo, or effect copies the
//! bindings of the owner it is created under, so a computation created inside
//! `provide` still sees the value when it re-runs long after `provide`
//! returned. The copy is cheap: values are shared behind `Rc`.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::ReactiveError;
use crate::graph::{ContextId, NodeId};

use super::runtime::{report_misuse, with_runtime};

/// A typed context key with a default value.
pub struct Context<T> {
    id: ContextId,
    default: Rc<T>,
}

/// Create a context key. `default` is returned by [`use_context`] when no
/// enclosing owner provides a value.
pub fn create_context<T: 'static>(default: T) -> Context<T> {
    Context {
        id: ContextId::new(),
        default: Rc::new(default),
    }
}

impl<T> Context<T> {
    /// Unique key of this context.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// The value used when nothing is provided.
    pub fn default_value(&self) -> &T {
        &self.default
    }
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            default: self.default.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("default", &self.default)
            .finish()
    }
}

/// Restores the binding that `provide` replaced.
struct Restore {
    owner: NodeId,
    key: ContextId,
    previous: Option<Rc<dyn Any>>,
}

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let replaced = with_runtime(|rt| {
            let node = rt.nodes.get_mut(self.owner)?;
            match previous {
                Some(value) => node.contexts.insert(self.key, value),
                None => node.contexts.remove(&self.key),
            }
        });
        // User values may have destructors; drop with the runtime released.
        drop(replaced);
    }
}

/// Run `f` with `value` bound to `context` on the current owner.
///
/// The previous binding is restored when `f` returns or unwinds. Without an
/// owner there is nowhere to bind the value: `f` runs without it, after the
/// misuse is reported according to `RuntimeConfig::strict_owners`.
///
/// ```rust,ignore
/// let theme = create_context("light");
/// create_root(|_| {
///     provide(&theme, "dark", || {
///         assert_eq!(use_context(&theme), "dark");
///     });
///     assert_eq!(use_context(&theme), "light");
/// });
/// ```
pub fn provide<T: 'static, R>(context: &Context<T>, value: T, f: impl FnOnce() -> R) -> R {
    let mut value = Some(Rc::new(value) as Rc<dyn Any>);
    let bound = with_runtime(|rt| {
        let owner = rt.current_owner()?;
        let node = rt.nodes.get_mut(owner)?;
        let previous = node.contexts.insert(context.id, value.take()?);
        Some(Restore {
            owner,
            key: context.id,
            previous,
        })
    });

    if bound.is_none() {
        report_misuse(ReactiveError::NoOwner("provide"));
    }
    let _restore = bound;
    f()
}

/// The nearest provided value for `context`, or its default.
pub fn use_context<T: Clone + 'static>(context: &Context<T>) -> T {
    try_use_context(context).unwrap_or_else(|| T::clone(&context.default))
}

/// The nearest provided value for `context`, if any owner provides one.
pub fn try_use_context<T: Clone + 'static>(context: &Context<T>) -> Option<T> {
    let found = with_runtime(|rt| rt.lookup_context(context.id))?;
    found.downcast_ref::<T>().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{
        create_memo, create_render_effect, create_root, create_signal, WriteSignal,
    };
    use std::cell::RefCell;

    /// Disposes a signal when the last copy of the context value goes away.
    struct DisposeOnDrop(WriteSignal<i32>);

    impl Drop for DisposeOnDrop {
        fn drop(&mut self) {
            self.0.dispose();
        }
    }

    #[test]
    fn default_without_provider() {
        let ctx = create_context(7);
        assert_eq!(use_context(&ctx), 7);
        assert_eq!(try_use_context(&ctx), None);
    }

    #[test]
    fn provide_is_scoped_to_the_closure() {
        let ctx = create_context("light");
        create_root(|_| {
            provide(&ctx, "dark", || {
                assert_eq!(use_context(&ctx), "dark");
                provide(&ctx, "contrast", || assert_eq!(use_context(&ctx), "contrast"));
                assert_eq!(use_context(&ctx), "dark");
            });
            assert_eq!(use_context(&ctx), "light");
        });
    }

    #[test]
    fn nested_roots_see_the_parent_value() {
        let ctx = create_context(0);
        create_root(|_| {
            provide(&ctx, 1, || {
                create_root(|_| assert_eq!(use_context(&ctx), 1));
            })
        });
    }

    #[test]
    fn computations_keep_the_value_after_provide_returns() {
        let ctx = create_context(String::from("default"));
        let (trigger, set_trigger) = create_signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));

        let memo = create_root(|_| {
            let s = seen.clone();
            let inner = ctx.clone();
            provide(&ctx, String::from("provided"), move || {
                let effect_ctx = inner.clone();
                create_render_effect(move || {
                    trigger.get();
                    s.borrow_mut().push(use_context(&effect_ctx));
                });
                create_memo(move || use_context(&inner))
            })
        });

        set_trigger.set(1);
        assert_eq!(*seen.borrow(), vec!["provided", "provided"]);
        assert_eq!(memo.get(), "provided");
    }

    #[test]
    fn context_values_may_use_the_runtime_when_dropped() {
        let ctx = create_context(None::<Rc<DisposeOnDrop>>);
        let (signal, set_signal) = create_signal(0);

        let root = create_root(|root| {
            provide(&ctx, Some(Rc::new(DisposeOnDrop(set_signal))), || {
                create_memo(|| 1);
            });
            root
        });
        assert!(!signal.is_disposed());

        // The memo holds the last copy of the value.
        root.dispose();
        assert!(signal.is_disposed());
    }

    #[test]
    fn provide_without_owner_still_runs() {
        let ctx = create_context(1);
        let result = provide(&ctx, 2, || use_context(&ctx));
        assert_eq!(result, 1);
    }

    #[test]
    fn contexts_are_independent() {
        let a = create_context(1);
        let b = create_context(2);
        create_root(|_| {
            provide(&a, 10, || {
                assert_eq!(use_context(&a), 10);
                assert_eq!(use_context(&b), 2);
            })
        });
    }
}
