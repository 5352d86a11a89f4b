//! Resources
//!
//! A resource is an asynchronously produced value exposed as reactive state.
//! A fetcher is handed a [`Resolver`] and a [`Rejecter`]; calling one of them,
//! now or later, settles the resource and notifies everything reading it.
//!
//! # States
//!
//! ```text
//!              fetch               resolve(v)
//! Unresolved ─────────▶ Pending ─────────────▶ Ready(v)
//!                          │   reject(msg)
//!                          └─────────────────▶ Errored(msg)
//! ```
//!
//! `refetch` moves any state back to `Pending`. Rejection is a state, not an
//! error: readers branch on [`ResourceState::Errored`].
//!
//! # Fetch Generations
//!
//! Every fetch bumps a generation counter and hands out settlers stamped with
//! it. A settler from a superseded fetch, a second settle call within one
//! fetch, and any settle after the resource (or its owner) was disposed are
//! all ignored. The last fetch wins.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::error::Result;

use super::batch::batch;
use super::owner::try_on_cleanup;
use super::effect::create_render_effect;
use super::signal::{create_signal, ReadSignal, WriteSignal};
use super::tracking::{untrack, Readable};

/// Where a resource is in its fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState<T> {
    /// No fetch has started (a sourced resource whose source is `None`).
    Unresolved,
    /// A fetch is in flight.
    Pending,
    /// The last fetch resolved.
    Ready(T),
    /// The last fetch was rejected.
    Errored(String),
}

impl<T> ResourceState<T> {
    /// Short lowercase name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Unresolved => "unresolved",
            ResourceState::Pending => "pending",
            ResourceState::Ready(_) => "ready",
            ResourceState::Errored(_) => "errored",
        }
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, ResourceState::Pending)
    }

    /// The resolved value, if ready.
    pub fn value(&self) -> Option<&T> {
        match self {
            ResourceState::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// The rejection message, if errored.
    pub fn error(&self) -> Option<&str> {
        match self {
            ResourceState::Errored(message) => Some(message),
            _ => None,
        }
    }
}

type Fetcher<T> = Rc<dyn Fn(Resolver<T>, Rejecter<T>)>;

struct ResourceInner<T: 'static> {
    state: (ReadSignal<ResourceState<T>>, WriteSignal<ResourceState<T>>),
    latest: (ReadSignal<Option<T>>, WriteSignal<Option<T>>),
    generation: Cell<u64>,
    disposed: Cell<bool>,
    fetcher: RefCell<Option<Fetcher<T>>>,
}

impl<T: Clone + 'static> ResourceInner<T> {
    fn new(initial: ResourceState<T>, fetcher: Option<Fetcher<T>>) -> Rc<Self> {
        let inner = Rc::new(Self {
            state: create_signal(initial),
            latest: create_signal(None),
            generation: Cell::new(0),
            disposed: Cell::new(false),
            fetcher: RefCell::new(fetcher),
        });

        // Without an owner the resource lives until disposed by hand.
        let weak = Rc::downgrade(&inner);
        let _ = try_on_cleanup(move || {
            if let Some(inner) = weak.upgrade() {
                inner.dispose();
            }
        });
        inner
    }

    fn fetch(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        let Some(fetcher) = self.fetcher.borrow().clone() else {
            tracing::debug!("refetch ignored: resource has no fetcher");
            return;
        };

        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let _ = self.state.1.try_set(ResourceState::Pending);

        let resolver = Resolver {
            inner: Rc::downgrade(self),
            generation,
        };
        let rejecter = Rejecter {
            inner: Rc::downgrade(self),
            generation,
        };
        untrack(|| fetcher(resolver, rejecter));
    }

    /// Forget the fetcher and invalidate the fetch in flight.
    fn unresolve(&self) {
        self.generation.set(self.generation.get() + 1);
        self.fetcher.borrow_mut().take();
        let _ = self.state.1.try_set(ResourceState::Unresolved);
    }

    /// Whether a settler stamped with `generation` may still settle.
    fn accepts(&self, generation: u64) -> bool {
        !self.disposed.get()
            && self.generation.get() == generation
            && self
                .state
                .0
                .try_with_untracked(ResourceState::is_loading)
                .unwrap_or(false)
    }

    fn settle(&self, generation: u64, state: ResourceState<T>) -> bool {
        if !self.accepts(generation) {
            tracing::trace!(generation, state = state.as_str(), "ignored stale settle");
            return false;
        }
        batch(|| {
            if let ResourceState::Ready(value) = &state {
                let _ = self.latest.1.try_set(Some(value.clone()));
            }
            self.state.1.try_set(state).is_ok()
        })
    }
}

impl<T: 'static> ResourceInner<T> {
    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.generation.set(self.generation.get() + 1);
        // The fetcher may own user state; drop it before the signals go.
        drop(self.fetcher.borrow_mut().take());
        self.state.1.dispose();
        self.latest.1.dispose();
    }
}

/// Reactive handle to an asynchronously produced value.
pub struct Resource<T: 'static> {
    inner: Rc<ResourceInner<T>>,
}

/// Create a resource and start fetching right away.
///
/// `fetcher` receives the settlers for the new fetch; it may call one of them
/// before returning or keep them for later. It runs again on every
/// [`Resource::refetch`].
///
/// ```rust,ignore
/// let user = create_resource(|resolve, _reject| {
///     set_timeout(50, move || {
///         resolve.resolve("ada");
///     });
/// });
/// assert!(user.loading());
/// advance(50);
/// assert_eq!(user.get(), Some("ada"));
/// ```
pub fn create_resource<T: Clone + 'static>(
    fetcher: impl Fn(Resolver<T>, Rejecter<T>) + 'static,
) -> Resource<T> {
    let inner = ResourceInner::new(ResourceState::Pending, Some(Rc::new(fetcher)));
    inner.fetch();
    Resource { inner }
}

/// Create a resource that fetches with the value produced by `source`.
///
/// The source is tracked: whenever it changes the resource fetches again.
/// While it produces `None` the resource is [`ResourceState::Unresolved`] and
/// any fetch in flight is discarded.
pub fn create_resource_with_source<S, T>(
    source: impl Fn() -> Option<S> + 'static,
    fetcher: impl Fn(S, Resolver<T>, Rejecter<T>) + 'static,
) -> Resource<T>
where
    S: Clone + 'static,
    T: Clone + 'static,
{
    let inner = ResourceInner::new(ResourceState::Unresolved, None);
    let fetcher = Rc::new(fetcher);

    let driver = inner.clone();
    create_render_effect(move || match source() {
        None => driver.unresolve(),
        Some(input) => {
            let fetcher = fetcher.clone();
            let bound: Fetcher<T> =
                Rc::new(move |resolve, reject| fetcher(input.clone(), resolve, reject));
            *driver.fetcher.borrow_mut() = Some(bound);
            driver.fetch();
        }
    });

    Resource { inner }
}

/// Create a resource settled entirely from the outside.
///
/// The resource starts `Pending`; the returned settlers resolve or reject it.
/// It has no fetcher, so [`Resource::refetch`] does nothing.
pub fn create_deferred<T: Clone + 'static>() -> (Resource<T>, Resolver<T>, Rejecter<T>) {
    let inner = ResourceInner::new(ResourceState::Pending, None);
    let generation = inner.generation.get();
    let resolver = Resolver {
        inner: Rc::downgrade(&inner),
        generation,
    };
    let rejecter = Rejecter {
        inner: Rc::downgrade(&inner),
        generation,
    };
    (Resource { inner }, resolver, rejecter)
}

impl<T: Clone + 'static> Resource<T> {
    /// The resolved value, tracked. `None` unless the state is `Ready`.
    #[track_caller]
    pub fn get(&self) -> Option<T> {
        self.inner.state.0.with(|state| state.value().cloned())
    }

    /// Like [`get`](Self::get), returning `Err` once the resource is disposed.
    pub fn try_get(&self) -> Result<Option<T>> {
        self.inner.state.0.try_with(|state| state.value().cloned())
    }

    /// The full state, tracked.
    #[track_caller]
    pub fn state(&self) -> ResourceState<T> {
        self.inner.state.0.get()
    }

    /// Whether a fetch is in flight, tracked.
    #[track_caller]
    pub fn loading(&self) -> bool {
        self.inner.state.0.with(ResourceState::is_loading)
    }

    /// The rejection message of the last fetch, tracked.
    #[track_caller]
    pub fn error(&self) -> Option<String> {
        self.inner
            .state
            .0
            .with(|state| state.error().map(str::to_owned))
    }

    /// The last resolved value, tracked. Unlike [`get`](Self::get) it is kept
    /// while a refetch is pending or after it fails.
    #[track_caller]
    pub fn latest(&self) -> Option<T> {
        self.inner.latest.0.get()
    }

    /// Reset to `Pending` and run the fetcher again. Settlers from earlier
    /// fetches stop working.
    pub fn refetch(&self) {
        batch(|| self.inner.fetch());
    }
}

impl<T: 'static> Resource<T> {
    /// Release the resource. Pending settle calls become no-ops.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether the resource or its owner has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Generation of the current fetch.
    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }
}

impl<T: Clone + 'static> Readable for Resource<T> {
    type Value = Option<T>;

    fn try_get(&self) -> Result<Option<T>> {
        Resource::try_get(self)
    }
}

impl<T: 'static> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self
            .inner
            .state
            .0
            .try_with_untracked(ResourceState::as_str)
            .unwrap_or("disposed");
        f.debug_struct("Resource")
            .field("state", &state)
            .field("generation", &self.inner.generation.get())
            .finish()
    }
}

/// Settles one fetch of a resource with a value.
pub struct Resolver<T: 'static> {
    inner: Weak<ResourceInner<T>>,
    generation: u64,
}

impl<T: Clone + 'static> Resolver<T> {
    /// Move the resource to `Ready(value)`. Returns `false` if the call was
    /// ignored: the fetch was superseded or already settled, or the resource
    /// is gone.
    pub fn resolve(&self, value: T) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.settle(self.generation, ResourceState::Ready(value)))
    }
}

/// Settles one fetch of a resource with an error message.
pub struct Rejecter<T: 'static> {
    inner: Weak<ResourceInner<T>>,
    generation: u64,
}

impl<T: Clone + 'static> Rejecter<T> {
    /// Move the resource to `Errored(message)`. Returns `false` if the call
    /// was ignored.
    pub fn reject(&self, message: impl Into<String>) -> bool {
        self.inner.upgrade().is_some_and(|inner| {
            inner.settle(self.generation, ResourceState::Errored(message.into()))
        })
    }
}

impl<T: 'static> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            generation: self.generation,
        }
    }
}

impl<T: 'static> Clone for Rejecter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            generation: self.generation,
        }
    }
}

impl<T: 'static> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("generation", &self.generation)
            .finish()
    }
}

impl<T: 'static> fmt::Debug for Rejecter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejecter")
            .field("generation", &self.generation)
            .finish()
    }
}
