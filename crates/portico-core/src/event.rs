//! Typed publish/subscribe primitive.
//!
//! Listeners fire synchronously, in registration order, against a snapshot of
//! the listener list taken when `fire` is called — listeners added or removed
//! by a running listener take effect on the *next* fire. A panicking listener
//! is isolated so the rest of the list still runs.
//!
//! Registering the same closure twice is additive: it fires once per
//! registration. Removal is by [`ListenerHandle`] since closures carry no
//! reference identity.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

/// Opaque handle returned by [`Event::add_listener`], used for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct EventInner<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

/// A named, typed event with ordered fan-out.
pub struct Event<T> {
    name: String,
    inner: Mutex<EventInner<T>>,
}

impl<T> Event<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(EventInner {
                next_id: 0,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, EventInner<T>> {
        // A panicking listener runs outside the lock, so poisoning here can
        // only come from a panic between lock and unlock in this module.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a listener. Duplicate registrations are additive: the same
    /// closure registered twice fires twice per event.
    pub fn add_listener(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> ListenerHandle {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.listeners.push((id, Arc::new(listener)));
        ListenerHandle(id)
    }

    /// Remove a registration. Unknown handles are a no-op.
    pub fn remove_listener(&self, handle: ListenerHandle) {
        let mut inner = self.lock();
        inner.listeners.retain(|(id, _)| *id != handle.0);
    }

    pub fn has_listeners(&self) -> bool {
        !self.lock().listeners.is_empty()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Invoke every currently-registered listener with `payload`, in
    /// registration order. The listener list is snapshotted before dispatch,
    /// and dispatch happens outside the lock, so listeners may freely
    /// add/remove listeners or fire other events.
    pub fn fire(&self, payload: &T) {
        let snapshot: Vec<Listener<T>> = {
            let inner = self.lock();
            inner.listeners.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in snapshot {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(payload))).is_err() {
                tracing::warn!("listener for event '{}' panicked; continuing", self.name);
            }
        }
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("listeners", &self.listener_count())
            .finish()
    }
}
