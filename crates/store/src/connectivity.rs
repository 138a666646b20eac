//! Connectivity relay.
//!
//! A plain observable over the online/offline flag: the host environment
//! feeds transitions in through [`ConnectivityMonitor::set_online`], and
//! registered subscribers are notified on each transition. No debouncing,
//! no retry triggering, and no pending-order flushing happens here; the
//! relay only forwards what the host signals.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Callback = Box<dyn Fn() + Send + Sync>;

/// Caller-supplied transition handlers. Both are optional.
#[derive(Default)]
pub struct ConnectivityCallbacks {
    on_online: Option<Callback>,
    on_offline: Option<Callback>,
}

impl ConnectivityCallbacks {
    /// Start with no handlers registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `handler` on every transition to online.
    #[must_use]
    pub fn on_online(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_online = Some(Box::new(handler));
        self
    }

    /// Invoke `handler` on every transition to offline.
    #[must_use]
    pub fn on_offline(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_offline = Some(Box::new(handler));
        self
    }
}

struct MonitorInner {
    online: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, Arc<ConnectivityCallbacks>>>,
}

/// Observable online/offline status.
///
/// Cheaply cloneable; all clones share the flag and the subscriber
/// registry. Dispatch happens inline in [`set_online`](Self::set_online),
/// only when the value actually changes.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<MonitorInner>,
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial status.
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                online: AtomicBool::new(initially_online),
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Current status; a direct read of the flag.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Feed a host connectivity signal in.
    ///
    /// Subscribers are notified only when the value changes; repeating the
    /// current status is silent.
    pub fn set_online(&self, online: bool) {
        let was = self.inner.online.swap(online, Ordering::SeqCst);
        if was == online {
            return;
        }

        if online {
            tracing::info!("connection restored");
        } else {
            tracing::warn!("connection lost");
        }

        // Snapshot the registry so callbacks can subscribe or unsubscribe
        // without deadlocking on the registry lock.
        let subscribers: Vec<Arc<ConnectivityCallbacks>> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for callbacks in subscribers {
            let handler = if online {
                &callbacks.on_online
            } else {
                &callbacks.on_offline
            };
            if let Some(handler) = handler {
                handler();
            }
        }
    }

    /// Register a subscriber.
    ///
    /// The returned [`Subscription`] unregisters the callbacks when dropped;
    /// keep it alive for as long as notifications are wanted.
    #[must_use]
    pub fn subscribe(&self, callbacks: ConnectivityCallbacks) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(callbacks));

        Subscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Handle to a registered subscriber.
pub struct Subscription {
    id: u64,
    inner: Arc<MonitorInner>,
}

impl Subscription {
    /// Unregister explicitly. Equivalent to dropping the handle.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counterpair() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
    }

    #[test]
    fn test_is_online_reads_flag() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(monitor.is_online());
        monitor.set_online(false);
        assert!(!monitor.is_online());
    }

    #[test]
    fn test_subscribers_fire_on_transitions_only() {
        let monitor = ConnectivityMonitor::new(true);
        let (online_hits, offline_hits) = counterpair();

        let online_counter = Arc::clone(&online_hits);
        let offline_counter = Arc::clone(&offline_hits);
        let _sub = monitor.subscribe(
            ConnectivityCallbacks::new()
                .on_online(move || {
                    online_counter.fetch_add(1, Ordering::SeqCst);
                })
                .on_offline(move || {
                    offline_counter.fetch_add(1, Ordering::SeqCst);
                }),
        );

        // Repeating the current status is not a transition.
        monitor.set_online(true);
        assert_eq!(online_hits.load(Ordering::SeqCst), 0);

        monitor.set_online(false);
        monitor.set_online(false);
        assert_eq!(offline_hits.load(Ordering::SeqCst), 1);

        monitor.set_online(true);
        assert_eq!(online_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribed_handles_never_fire() {
        let monitor = ConnectivityMonitor::new(true);
        let (_, offline_hits) = counterpair();

        let counter = Arc::clone(&offline_hits);
        let sub = monitor.subscribe(ConnectivityCallbacks::new().on_offline(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        sub.unsubscribe();
        monitor.set_online(false);
        assert_eq!(offline_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_multiple_independent_subscribers() {
        let monitor = ConnectivityMonitor::new(false);
        let (first, second) = counterpair();

        let first_counter = Arc::clone(&first);
        let _a = monitor.subscribe(ConnectivityCallbacks::new().on_online(move || {
            first_counter.fetch_add(1, Ordering::SeqCst);
        }));

        let second_counter = Arc::clone(&second);
        let b = monitor.subscribe(ConnectivityCallbacks::new().on_online(move || {
            second_counter.fetch_add(1, Ordering::SeqCst);
        }));

        monitor.set_online(true);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        // Dropping one handle leaves the other subscribed.
        drop(b);
        monitor.set_online(false);
        monitor.set_online(true);
        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callbacks_without_handlers_are_fine() {
        let monitor = ConnectivityMonitor::new(true);
        let _sub = monitor.subscribe(ConnectivityCallbacks::new());
        monitor.set_online(false);
        monitor.set_online(true);
    }
}
