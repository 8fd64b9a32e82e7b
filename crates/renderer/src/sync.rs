//! Cross-thread hand-off primitives between control threads and the render
//! thread.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Latest-value-wins parameter snapshot.
///
/// Writers replace the whole value; the render thread reads a consistent copy
/// once per frame. The version counter lets readers skip work when nothing
/// changed since their last look.
#[derive(Debug, Default)]
pub struct ParamSlot<T> {
    inner: Mutex<Versioned<T>>,
}

#[derive(Debug, Default)]
struct Versioned<T> {
    value: T,
    version: u64,
}

impl<T: Clone> ParamSlot<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(Versioned { value, version: 0 }),
        }
    }

    pub fn set(&self, value: T) {
        let mut guard = self.inner.lock();
        guard.value = value;
        guard.version = guard.version.wrapping_add(1);
    }

    /// Applies `update` to the current value under the lock.
    pub fn update(&self, update: impl FnOnce(&T) -> T) -> T {
        let mut guard = self.inner.lock();
        let next = update(&guard.value);
        guard.value = next.clone();
        guard.version = guard.version.wrapping_add(1);
        next
    }

    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    pub fn snapshot(&self) -> (T, u64) {
        let guard = self.inner.lock();
        (guard.value.clone(), guard.version)
    }
}

impl<T: Clone + PartialEq> ParamSlot<T> {
    /// Stores `value` unless it equals the current one. Returns whether the
    /// slot changed; an unchanged slot keeps its version.
    pub fn set_if_changed(&self, value: T) -> bool {
        let mut guard = self.inner.lock();
        if guard.value == value {
            return false;
        }
        guard.value = value;
        guard.version = guard.version.wrapping_add(1);
        true
    }
}

/// Pending GPU-resource request: a payload offered by any thread and consumed
/// by the render thread on its next frame. Later offers replace earlier
/// unconsumed ones.
#[derive(Debug)]
pub struct PendingSlot<T> {
    inner: Mutex<Option<T>>,
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }
}

impl<T> PendingSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `payload`, returning the unconsumed payload it replaced.
    pub fn offer(&self, payload: T) -> Option<T> {
        self.inner.lock().replace(payload)
    }

    pub fn take(&self) -> Option<T> {
        self.inner.lock().take()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock().is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().take();
    }
}

/// One-shot readiness signal carrying a value.
///
/// The producer calls [`ReadySignal::set`] once the resource exists; any number
/// of consumers block in [`ReadySignal::wait`] until then or until the timeout
/// expires.
#[derive(Debug)]
pub struct ReadySignal<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> Default for ReadySignal<T> {
    fn default() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }
}

impl<T: Clone> ReadySignal<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `value` and wakes every waiter. Later calls replace the value.
    pub fn set(&self, value: T) {
        let mut guard = self.value.lock();
        *guard = Some(value);
        self.ready.notify_all();
    }

    /// Withdraws the value, e.g. once the resource it describes is released.
    pub fn reset(&self) {
        self.value.lock().take();
    }

    pub fn try_get(&self) -> Option<T> {
        self.value.lock().clone()
    }

    pub fn wait(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut guard = self.value.lock();
        while guard.is_none() {
            if self.ready.wait_until(&mut guard, deadline).timed_out() {
                break;
            }
        }
        guard.clone()
    }
}
