//! Unbounded single-producer queue with a non-blocking emptiness probe.
//!
//! The filter tools push a record descriptor (line count, delimiter list)
//! here *before* sending the corresponding bytes to the child process, and
//! the reader thread uses [`is_empty`](SingleProducerQueue::is_empty) to
//! detect the child producing output it was never given input for. The
//! probe is a point-in-time snapshot; the descriptor-before-bytes ordering
//! is what makes it a valid error signal.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Unbounded SPSC handoff. `produce` never blocks; `consume` blocks while
/// the queue is empty.
pub struct SingleProducerQueue<T> {
    inner: Mutex<VecDeque<T>>,
    added: Condvar,
}

impl<T> SingleProducerQueue<T> {
    pub fn new() -> Self {
        SingleProducerQueue {
            inner: Mutex::new(VecDeque::new()),
            added: Condvar::new(),
        }
    }

    pub fn produce(&self, value: T) {
        self.inner.lock().push_back(value);
        self.added.notify_one();
    }

    pub fn consume(&self) -> T {
        let mut inner = self.inner.lock();
        while inner.is_empty() {
            self.added.wait(&mut inner);
        }
        inner.pop_front().expect("queue non-empty after wait")
    }

    /// Snapshot emptiness check; the answer can be stale by the time the
    /// caller acts on it.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl<T> Default for SingleProducerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_order_preserved() {
        let queue = SingleProducerQueue::new();
        for i in 0..100 {
            queue.produce(i);
        }
        for i in 0..100 {
            assert_eq!(queue.consume(), i);
        }
    }

    #[test]
    fn test_consume_blocks_until_produced() {
        let queue = SingleProducerQueue::new();
        thread::scope(|scope| {
            let consumer = scope.spawn(|| queue.consume());
            thread::sleep(std::time::Duration::from_millis(20));
            queue.produce(42u32);
            assert_eq!(consumer.join().unwrap(), 42);
        });
    }

    #[test]
    fn test_is_empty_tracks_contents() {
        let queue = SingleProducerQueue::new();
        assert!(queue.is_empty());
        queue.produce(1);
        assert!(!queue.is_empty());
        queue.consume();
        assert!(queue.is_empty());
    }
}
