//! Observer list - ordered, synchronous snapshot delivery
//!
//! Each registration shares an `active` flag with its `Subscription`.
//! Clearing the flag stops delivery before the next callback, even when
//! it happens inside another subscriber's callback.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::snapshot::Snapshot;

type Callback = Box<dyn FnMut(&Arc<Snapshot>) + Send>;

struct Observer {
    active: Arc<AtomicBool>,
    callback: Callback,
}

/// Registered callbacks in subscription order
#[derive(Default)]
pub(crate) struct ObserverList {
    observers: Vec<Observer>,
}

impl ObserverList {
    pub(crate) fn subscribe<F>(&mut self, callback: F) -> Subscription
    where
        F: FnMut(&Arc<Snapshot>) + Send + 'static,
    {
        let active = Arc::new(AtomicBool::new(true));
        self.observers.push(Observer {
            active: Arc::clone(&active),
            callback: Box::new(callback),
        });
        Subscription { active }
    }

    /// Call every active observer once, in order, then drop the inactive ones
    pub(crate) fn notify(&mut self, snapshot: &Arc<Snapshot>) {
        for observer in &mut self.observers {
            if observer.active.load(Ordering::Acquire) {
                (observer.callback)(snapshot);
            }
        }
        self.observers
            .retain(|observer| observer.active.load(Ordering::Acquire));
    }

    pub(crate) fn len(&self) -> usize {
        self.observers
            .iter()
            .filter(|observer| observer.active.load(Ordering::Acquire))
            .count()
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("active", &self.len())
            .finish()
    }
}

/// Handle returned by `subscribe`
///
/// Dropping the handle unsubscribes. Call [`Subscription::detach`] to keep
/// the callback for the projector's lifetime.
#[must_use = "dropping a Subscription unsubscribes immediately"]
#[derive(Debug)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Stop further delivery. Idempotent.
    pub fn unsubscribe(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Keep the callback registered without holding the handle
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
