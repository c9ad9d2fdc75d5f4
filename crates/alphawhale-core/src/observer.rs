//! Ordered listener registry with stable unsubscribe tokens.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A state-change callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Token identifying one registration. Never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Registry<T> {
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, Listener<T>>,
}

/// Listeners are called in registration order.
pub struct ListenerSet<T> {
    inner: Mutex<Registry<T>>,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Registry {
                next_id: 0,
                listeners: BTreeMap::new(),
            }),
        }
    }

    pub fn insert(&self, listener: Listener<T>) -> SubscriptionId {
        let mut registry = self.lock();
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.insert(id, listener);
        id
    }

    /// Returns false if the id was not registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the current listeners out so they can be called without the lock.
    pub fn snapshot(&self) -> Vec<(SubscriptionId, Listener<T>)> {
        self.lock()
            .listeners
            .iter()
            .map(|(id, l)| (*id, Arc::clone(l)))
            .collect()
    }

    // Registry updates are single inserts/removes, so a poisoned lock still
    // guards a consistent map.
    fn lock(&self) -> MutexGuard<'_, Registry<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Call every listener with `value`. A panicking listener is logged and
/// skipped; the rest still run. Returns how many listeners panicked.
pub fn notify_all<T>(listeners: &[(SubscriptionId, Listener<T>)], value: &T) -> usize {
    let mut failed = 0;
    for (id, listener) in listeners {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(value))) {
            failed += 1;
            tracing::warn!(
                subscription = %id,
                panic = panic_message(payload.as_ref()),
                "Mode listener panicked, continuing with remaining listeners"
            );
        }
    }
    failed
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Handle returned by `subscribe`. Dropping it leaves the listener registered;
/// call [`Subscription::unsubscribe`] to remove it.
#[must_use = "the handle is the only way to unsubscribe this listener"]
pub struct Subscription<T> {
    id: SubscriptionId,
    set: Weak<ListenerSet<T>>,
}

impl<T> Subscription<T> {
    pub(crate) fn new(id: SubscriptionId, set: &Arc<ListenerSet<T>>) -> Self {
        Self {
            id,
            set: Arc::downgrade(set),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.set.upgrade() {
            Some(set) => set.remove(self.id),
            None => false,
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(hits: &Arc<AtomicUsize>) -> Listener<u32> {
        let hits = Arc::clone(hits);
        Arc::new(move |_: &u32| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn ids_are_never_reused() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let a = set.insert(counter(&hits));
        assert!(set.remove(a));
        let b = set.insert(counter(&hits));
        assert_ne!(a, b);
        assert!(!set.remove(a));
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            set.insert(Arc::new(move |_: &u32| order.lock().unwrap().push(tag)));
        }

        notify_all(&set.snapshot(), &7);
        assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let set: ListenerSet<u32> = ListenerSet::new();
        let hits = Arc::new(AtomicUsize::new(0));
        set.insert(counter(&hits));
        set.insert(Arc::new(|_: &u32| panic!("listener blew up")));
        set.insert(counter(&hits));

        let failed = notify_all(&set.snapshot(), &1);
        assert_eq!(failed, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_after_registry_dropped_is_harmless() {
        let set = Arc::new(ListenerSet::<u32>::new());
        let hits = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new(set.insert(counter(&hits)), &set);
        drop(set);
        assert!(!sub.unsubscribe());
    }
}
