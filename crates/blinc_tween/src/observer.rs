//! Observers and subscriptions
//!
//! A tween broadcasts to [`Observer`]s. Subscribing returns a
//! [`Subscription`] that detaches the observer when released or dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A consumer of a tween's notifications
///
/// Notifications may arrive on the frame clock's thread, so observers must be
/// `Send + Sync`. They are called without any engine lock held and may
/// subscribe, release, pause or resume from inside a callback.
pub trait Observer<T>: Send + Sync {
    /// Called with each new interpolated value
    fn on_next(&self, value: &T);

    /// Called once after the last value of the last repeat
    fn on_completed(&self) {}
}

/// Observer built from closures
pub(crate) struct FnObserver<N, C> {
    pub(crate) on_next: N,
    pub(crate) on_completed: C,
}

impl<T, N, C> Observer<T> for FnObserver<N, C>
where
    N: Fn(&T) + Send + Sync,
    C: Fn() + Send + Sync,
{
    fn on_next(&self, value: &T) {
        (self.on_next)(value)
    }

    fn on_completed(&self) {
        (self.on_completed)()
    }
}

/// Identifies one observer within one tween
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// Implemented by anything an observer can be detached from
pub(crate) trait ObserverRegistry: Send + Sync {
    fn remove_observer(&self, id: ObserverId);
}

/// Disposer for one (tween, observer) pair
///
/// The subscription keeps the tween alive while it is attached.
#[must_use = "dropping a Subscription detaches its observer"]
pub struct Subscription {
    target: Option<(Arc<dyn ObserverRegistry>, ObserverId)>,
    released: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(registry: Arc<dyn ObserverRegistry>, id: ObserverId) -> Self {
        Self {
            target: Some((registry, id)),
            released: AtomicBool::new(false),
        }
    }

    /// A subscription with nothing to detach
    pub(crate) fn released() -> Self {
        Self {
            target: None,
            released: AtomicBool::new(true),
        }
    }

    /// The observer this subscription detaches, if it was ever attached
    pub fn observer_id(&self) -> Option<ObserverId> {
        self.target.as_ref().map(|(_, id)| *id)
    }

    /// Detach the observer
    ///
    /// Only the first call has an effect. Detaching the last observer stops
    /// the tween's clock subscription but keeps its elapsed time and
    /// remaining repeats.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some((registry, id)) = &self.target {
            registry.remove_observer(*id);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Give up the handle while leaving the observer attached
    ///
    /// The observer then stays attached until the tween completes. A running
    /// tween is owned by its clock, so this holds even after every [`Tween`]
    /// handle is dropped.
    ///
    /// [`Tween`]: crate::Tween
    pub fn detach(mut self) {
        self.target = None;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("observer", &self.observer_id())
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
