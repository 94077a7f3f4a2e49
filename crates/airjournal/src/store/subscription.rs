//! Cancellable subscriptions and the listener registries behind them.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::trace;

/// A handle to a registered listener.
///
/// Cloning yields another handle to the same registration. Dropping a handle
/// does not cancel it; call [`Subscription::cancel`].
#[derive(Debug, Clone)]
pub struct Subscription {
    active: Arc<AtomicBool>,
}

impl Subscription {
    pub(crate) fn new() -> Self {
        Self {
            active: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Stop further deliveries to this listener.
    ///
    /// Takes effect before the next delivery, even when called from inside
    /// the listener itself. Returns `true` only for the call that actually
    /// cancelled; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.active.swap(false, Ordering::SeqCst)
    }

    /// Check whether the listener still receives deliveries.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A set of listeners for one value stream.
///
/// Listeners run without the registry lock held, so they may subscribe,
/// cancel or read shared state freely.
pub(crate) struct SubscriberSet<T: ?Sized> {
    entries: Mutex<Vec<(Subscription, Listener<T>)>>,
}

impl<T: ?Sized> SubscriberSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, listener: Listener<T>) -> Subscription {
        let subscription = Subscription::new();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|(sub, _)| sub.is_active());
        entries.push((subscription.clone(), listener));
        subscription
    }

    /// Deliver `value` to every active listener, returning how many ran.
    pub(crate) fn notify(&self, value: &T) -> usize {
        let entries = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.retain(|(sub, _)| sub.is_active());
            entries.clone()
        };

        let mut delivered = 0;
        for (subscription, listener) in entries {
            // An earlier listener may have cancelled this one.
            if subscription.is_active() {
                listener(value);
                delivered += 1;
            }
        }
        delivered
    }

    pub(crate) fn active_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(sub, _)| sub.is_active())
            .count()
    }
}

impl<T: ?Sized> fmt::Debug for SubscriberSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("active", &self.active_count())
            .finish()
    }
}

/// Listener sets keyed by collection path, as kept by store adapters.
///
/// Publications go out one at a time. Listeners must not write to the
/// publishing store synchronously.
pub(crate) struct CollectionSubscribers<T> {
    sets: Mutex<HashMap<String, Arc<SubscriberSet<T>>>>,
    delivery: Mutex<()>,
}

impl<T> CollectionSubscribers<T> {
    pub(crate) fn new() -> Self {
        Self {
            sets: Mutex::new(HashMap::new()),
            delivery: Mutex::new(()),
        }
    }

    fn set_for(&self, collection: &str) -> Arc<SubscriberSet<T>> {
        let mut sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            sets.entry(collection.to_string())
                .or_insert_with(|| Arc::new(SubscriberSet::new())),
        )
    }

    pub(crate) fn subscribe(&self, collection: &str, listener: Listener<T>) -> Subscription {
        trace!("Registering listener on {}", collection);
        self.set_for(collection).add(listener)
    }

    /// Read the current value with `load` and deliver it.
    ///
    /// Loading and delivery happen under one lock, so the last delivery a
    /// listener sees always carries the newest state even when writers race.
    /// A `None` from `load` skips the delivery.
    pub(crate) fn publish_latest<F>(&self, collection: &str, load: F) -> usize
    where
        F: FnOnce() -> Option<T>,
    {
        let _delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        load().map_or(0, |value| self.publish(collection, &value))
    }

    fn publish(&self, collection: &str, value: &T) -> usize {
        let set = {
            let sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
            sets.get(collection).map(Arc::clone)
        };
        set.map_or(0, |set| set.notify(value))
    }
}

impl<T> fmt::Debug for CollectionSubscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sets = self.sets.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("CollectionSubscribers")
            .field("collections", &sets.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, Listener<u32>) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let listener: Listener<u32> = Arc::new(move |_: &u32| {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, listener)
    }

    #[test]
    fn test_subscription_cancel_is_idempotent() {
        let sub = Subscription::new();
        assert!(sub.is_active());
        assert!(sub.cancel());
        assert!(!sub.cancel());
        assert!(!sub.is_active());
    }

    #[test]
    fn test_subscription_clone_shares_state() {
        let sub = Subscription::new();
        let other = sub.clone();
        other.cancel();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_notify_reaches_active_listeners() {
        let set = SubscriberSet::<u32>::new();
        let (count, listener) = counter();
        let sub = set.add(listener);

        assert_eq!(set.notify(&1), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sub.cancel();
        assert_eq!(set.notify(&2), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(set.active_count(), 0);
    }

    #[test]
    fn test_cancel_from_inside_listener() {
        let set = Arc::new(SubscriberSet::<u32>::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_slot = Arc::clone(&slot);
        let inner_calls = Arc::clone(&calls);
        let sub = set.add(Arc::new(move |_: &u32| {
            inner_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(sub) = inner_slot.lock().unwrap().as_ref() {
                sub.cancel();
                sub.cancel();
            }
        }));
        *slot.lock().unwrap() = Some(sub);

        set.notify(&1);
        set.notify(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_earlier_listener_cancels_later_one() {
        let set = SubscriberSet::<u32>::new();
        let (count, listener) = counter();

        let victim_handle: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let handle = Arc::clone(&victim_handle);
        set.add(Arc::new(move |_: &u32| {
            if let Some(sub) = handle.lock().unwrap().as_ref() {
                sub.cancel();
            }
        }));
        let later = set.add(listener);
        *victim_handle.lock().unwrap() = Some(later);

        assert_eq!(set.notify(&7), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collection_subscribers_are_isolated() {
        let subscribers = CollectionSubscribers::<u32>::new();
        let (points, points_listener) = counter();
        let (entries, entries_listener) = counter();
        subscribers.subscribe("points", points_listener);
        subscribers.subscribe("entries", entries_listener);

        assert_eq!(subscribers.publish_latest("points", || Some(1)), 1);
        assert_eq!(subscribers.publish_latest("nobody", || Some(1)), 0);
        assert_eq!(subscribers.publish_latest("points", || None), 0);
        assert_eq!(points.load(Ordering::SeqCst), 1);
        assert_eq!(entries.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_output() {
        let set = SubscriberSet::<u32>::new();
        let (_, listener) = counter();
        set.add(listener);
        assert!(format!("{set:?}").contains("active: 1"));
    }
}
