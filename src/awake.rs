//! Cross-thread wakeups for the UI thread.
//!
//! Drawing itself is single-threaded. Background threads hold an
//! [`AwakeHandle`] to post messages and wake the UI thread, and may
//! take the UI lock before touching state shared with it.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use parking_lot::{Condvar, Mutex, MutexGuard};

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    ready: Condvar,
    ui_lock: Mutex<()>,
}

/// The UI-thread side: receives wakeup messages.
pub struct Awake<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Default for Awake<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Awake<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                ready: Condvar::new(),
                ui_lock: Mutex::new(()),
            }),
        }
    }

    pub fn handle(&self) -> AwakeHandle<T> {
        AwakeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Pops the oldest pending message without blocking.
    pub fn try_next(&self) -> Option<T> {
        self.shared.queue.lock().pop_front()
    }

    /// Takes all pending messages.
    pub fn drain(&self) -> Vec<T> {
        self.shared.queue.lock().drain(..).collect()
    }

    /// Blocks until a message arrives or `timeout` elapses.
    pub fn wait(&self, timeout: Duration) -> Option<T> {
        let mut queue = self.shared.queue.lock();
        if queue.is_empty() {
            let _ = self.shared.ready.wait_for(&mut queue, timeout);
        }
        queue.pop_front()
    }

    /// Acquires the UI lock.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.shared.ui_lock.lock()
    }
}

/// The background side: wakes the UI thread. Cheap to clone.
pub struct AwakeHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for AwakeHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> AwakeHandle<T> {
    /// Queues `message` and wakes the UI thread.
    pub fn awake(&self, message: T) {
        self.shared.queue.lock().push_back(message);
        self.shared.ready.notify_one();
    }

    /// Acquires the UI lock.
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.shared.ui_lock.lock()
    }
}
