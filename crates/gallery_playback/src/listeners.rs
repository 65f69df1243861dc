//! Listener registry
//!
//! A small pub/sub primitive shared by the state and event channels.
//! Listeners are reference-counted closures; the `Arc` allocation is the
//! listener's identity, so subscribing the same `Arc` twice registers it
//! once.

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};
use std::sync::{Arc, Weak};

new_key_type! {
    /// Handle to a registered listener
    pub struct ListenerId;
}

/// A notification callback for payloads of type `T`.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

type Registry<T> = Mutex<SlotMap<ListenerId, Listener<T>>>;

/// A deduplicated set of listeners.
pub struct ListenerSet<T> {
    listeners: Arc<Registry<T>>,
}

impl<T: 'static> ListenerSet<T> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Register a listener. Registering a listener that is already present
    /// returns a subscription for the existing entry.
    pub fn subscribe(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut listeners = self.listeners.lock();
            let existing = listeners
                .iter()
                .find(|(_, l)| same_listener(l, &listener))
                .map(|(id, _)| id);
            match existing {
                Some(id) => id,
                None => listeners.insert(listener),
            }
        };

        let registry: Weak<Registry<T>> = Arc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.lock().remove(id);
            }
        })
    }

    /// Call every listener with `payload`.
    ///
    /// Listeners run on a snapshot of the set taken before the first call,
    /// without the registry lock held, so a listener may subscribe or
    /// unsubscribe from inside its callback.
    pub fn notify(&self, payload: &T) {
        let listeners: Vec<Listener<T>> = self.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(payload);
        }
    }

    /// Drop every listener.
    pub fn clear(&self) {
        self.listeners.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn same_listener<T>(a: &Listener<T>, b: &Listener<T>) -> bool {
    // Compare data pointers only; vtable pointers for the same type may differ.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Returned by `subscribe`; call [`Subscription::unsubscribe`] to stop
/// receiving notifications.
///
/// Dropping a subscription does not unsubscribe.
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(unsubscribe: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    /// Remove the listener. A no-op if the set was already cleared or dropped.
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
