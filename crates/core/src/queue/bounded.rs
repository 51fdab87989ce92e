//! Bounded blocking MPMC queue.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Diagnostic counters: how often producers and consumers had to wait.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Times `push` found the queue full and blocked.
    pub overflow: u64,
    /// Times `pop` found the queue empty and blocked.
    pub underflow: u64,
}

struct Inner<T> {
    buffer: VecDeque<T>,
    stats: QueueStats,
}

/// Fixed-capacity FIFO handoff. `push` blocks while full, `pop` blocks
/// while empty; any number of producers and consumers may share it. The
/// capacity bound is what gives the pipeline backpressure: a slow consumer
/// stalls its producers instead of letting memory grow.
pub struct BoundedQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
    added: Condvar,
    removed: Condvar,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        BoundedQueue {
            capacity,
            inner: Mutex::new(Inner {
                buffer: VecDeque::with_capacity(capacity),
                stats: QueueStats::default(),
            }),
            added: Condvar::new(),
            removed: Condvar::new(),
        }
    }

    /// Append an item, waiting for room if the queue is at capacity.
    pub fn push(&self, item: T) {
        let mut inner = self.inner.lock();
        while inner.buffer.len() >= self.capacity {
            inner.stats.overflow += 1;
            self.removed.wait(&mut inner);
        }
        inner.buffer.push_back(item);
        drop(inner);
        self.added.notify_one();
    }

    /// Remove the oldest item, waiting if the queue is empty.
    pub fn pop(&self) -> T {
        let mut inner = self.inner.lock();
        while inner.buffer.is_empty() {
            inner.stats.underflow += 1;
            self.added.wait(&mut inner);
        }
        let item = inner.buffer.pop_front().expect("buffer non-empty after wait");
        drop(inner);
        self.removed.notify_one();
        item
    }

    /// Current number of queued items.
    pub fn len(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the blocking counters. Meaningful once the queue has
    /// quiesced; mid-flight reads are only approximate.
    pub fn stats(&self) -> QueueStats {
        self.inner.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(8);
        for i in 0..5 {
            queue.push(i);
        }
        for i in 0..5 {
            assert_eq!(queue.pop(), i);
        }
    }

    #[test]
    fn test_all_items_cross_threads() {
        let queue = BoundedQueue::new(4);
        let total: u64 = thread::scope(|scope| {
            let consumers: Vec<_> = (0..3)
                .map(|_| {
                    scope.spawn(|| {
                        let mut sum = 0u64;
                        while let Some(value) = queue.pop() {
                            sum += value;
                        }
                        sum
                    })
                })
                .collect();

            for value in 1..=100u64 {
                queue.push(Some(value));
            }
            for _ in 0..3 {
                queue.push(None);
            }

            consumers.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(total, 5050);
    }

    #[test]
    fn test_capacity_bounds_in_flight_items() {
        let queue = BoundedQueue::new(2);
        thread::scope(|scope| {
            let producer = scope.spawn(|| {
                for value in 0..50 {
                    queue.push(Some(value));
                    // The queue itself may never hold more than its capacity.
                    assert!(queue.len() <= 2);
                }
                queue.push(None);
            });
            while queue.pop().is_some() {
                thread::yield_now();
            }
            producer.join().unwrap();
        });
        let stats = queue.stats();
        assert!(stats.overflow > 0, "a slow consumer must block the producer");
    }

    #[test]
    fn test_underflow_counts_waiting_consumers() {
        let queue = BoundedQueue::new(2);
        thread::scope(|scope| {
            let consumer = scope.spawn(|| queue.pop());
            thread::sleep(std::time::Duration::from_millis(20));
            queue.push(7u32);
            assert_eq!(consumer.join().unwrap(), 7);
        });
        assert!(queue.stats().underflow > 0);
    }
}
