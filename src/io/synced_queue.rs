//! Bounded-lifetime MPSC hand-off between pipeline stages.
//!
//! Producers `push` items; the single consumer blocks in [`acquire`]
//! until work arrives or its stop predicate fires, then detaches the
//! entire pending batch in one step. Returning a batch instead of one
//! item lets the consumer coalesce work without reacquiring the lock.
//!
//! [`acquire`]: SyncedQueue::acquire

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// FIFO queue with batched, stoppable consumption.
#[derive(Debug, Default)]
pub struct SyncedQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Condvar,
}

impl<T> SyncedQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
        }
    }

    /// Enqueue an item at the tail and wake one waiter.
    ///
    /// Always succeeds; items pushed after shutdown are drained and
    /// discarded by the consumer.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Block until the queue is non-empty or `stop` returns true, then
    /// detach and return the whole pending batch.
    ///
    /// The batch is empty only when the stop predicate fired with
    /// nothing queued, which is the consumer's termination signal.
    pub fn acquire(&self, stop: impl Fn() -> bool) -> VecDeque<T> {
        let mut items = self.items.lock();
        while items.is_empty() && !stop() {
            self.available.wait(&mut items);
        }
        std::mem::take(&mut *items)
    }

    /// Wake all waiters unconditionally. Used on teardown so a blocked
    /// consumer re-evaluates its stop predicate.
    pub fn notify(&self) {
        self.available.notify_all();
    }

    /// Number of currently queued items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
