// Single-resolution deferred value.
// A continuation may be attached before or after resolution; it runs exactly once.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::warn;

type Continuation<T> = Box<dyn FnOnce(T) + Send + 'static>;

struct Slot<T> {
    resolved: bool,
    continuation: Option<Continuation<T>>,
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    value: watch::Sender<Option<T>>,
}

/// A value that becomes available once, at some later point.
///
/// `Deferred` is a shared handle: clones observe the same resolution.
pub struct Deferred<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("resolved", &self.lock().resolved)
            .finish()
    }
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let (value, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    resolved: false,
                    continuation: None,
                }),
                value,
            }),
        }
    }

    /// Create a deferred that is already resolved with `value`.
    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.resolve(value);
        deferred
    }

    /// Attach the continuation.
    ///
    /// Runs `callback` immediately when the value is already there, otherwise stores it
    /// (replacing any continuation stored earlier) to run at resolution.
    pub fn attach<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        let mut slot = self.lock();
        if slot.resolved {
            drop(slot);
            if let Some(value) = self.inner.value.borrow().clone() {
                callback(value);
            }
            return;
        }
        slot.continuation = Some(Box::new(callback));
    }

    /// Resolve with `value` and run the stored continuation.
    ///
    /// Returns `false` and leaves everything untouched if the deferred was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.resolved {
            warn!("ignoring second resolution of a deferred value");
            return false;
        }
        slot.resolved = true;
        self.inner.value.send_replace(Some(value.clone()));
        let continuation = slot.continuation.take();
        drop(slot);

        if let Some(callback) = continuation {
            callback(value);
        }
        true
    }

    pub fn is_resolved(&self) -> bool {
        self.lock().resolved
    }

    /// The resolved value, if any.
    pub fn value(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    /// Wait for resolution without consuming the continuation slot.
    pub async fn wait(&self) -> T {
        let mut rx = self.inner.value.subscribe();
        loop {
            if let Some(value) = rx.borrow_and_update().clone() {
                return value;
            }
            if rx.changed().await.is_err() {
                // The sender lives as long as `self`; this arm is unreachable in practice.
                return std::future::pending().await;
            }
        }
    }
}

impl<T> Deferred<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> Default for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
