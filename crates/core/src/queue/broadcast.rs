//! Page-linked broadcast queue: one producer, many consumers, each consumer
//! observes the full stream from the moment it subscribed.
//!
//! Values live in a singly-linked chain of fixed-size pages. The producer
//! holds the tail; every [`Listener`] holds the page its cursor points into,
//! so pages stay alive exactly as long as someone can still read them and
//! are freed by the last reference — no back-pointers, no explicit
//! reclamation. Slots are write-once (`OnceLock`), published by bumping the
//! value count under the mutex, so a reader never observes a torn write.

use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex};

use crate::array_view::ArrayView;
use crate::config;

struct Page<T> {
    slots: ArrayView<OnceLock<T>>,
    next: OnceLock<Arc<Page<T>>>,
}

impl<T> Page<T> {
    fn new(size: usize) -> Self {
        Page {
            slots: ArrayView::allocate(size),
            next: OnceLock::new(),
        }
    }
}

struct State<T> {
    tail: Arc<Page<T>>,
    count: usize,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    added: Condvar,
    page_size: usize,
}

/// Single-producer broadcast queue. Cloning is deliberately not offered;
/// hand out [`Listener`]s instead.
pub struct BroadcastQueue<T> {
    shared: Arc<Shared<T>>,
}

/// A consumer cursor into the broadcast stream. Created by
/// [`BroadcastQueue::listen`]; sees every value pushed after creation, in
/// order, and keeps working even after the queue itself is dropped.
pub struct Listener<T> {
    shared: Arc<Shared<T>>,
    page: Arc<Page<T>>,
    offset: usize,
}

impl<T: Clone> BroadcastQueue<T> {
    pub fn new() -> Self {
        Self::with_page_size(config::BROADCAST_PAGE_SIZE)
    }

    /// Page size is a capacity/latency trade-off; tests use small pages to
    /// exercise the chain.
    pub fn with_page_size(page_size: usize) -> Self {
        assert!(page_size > 0, "page size must be at least 1");
        BroadcastQueue {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    tail: Arc::new(Page::new(page_size)),
                    count: 0,
                }),
                added: Condvar::new(),
                page_size,
            }),
        }
    }

    /// Subscribe. The listener starts at the current count and therefore
    /// observes only subsequent values.
    pub fn listen(&self) -> Listener<T> {
        let state = self.shared.state.lock();
        Listener {
            shared: Arc::clone(&self.shared),
            page: Arc::clone(&state.tail),
            offset: state.count,
        }
    }

    /// Publish a value to every current listener.
    pub fn push(&self, value: T) {
        let mut state = self.shared.state.lock();
        let slot = state.count % self.shared.page_size;

        let published = state.tail.slots[slot].set(value).is_ok();
        debug_assert!(published, "broadcast slot written twice");

        // The page filled up: link the next page before publishing, so a
        // listener that advances past this count always finds it.
        if slot + 1 == self.shared.page_size {
            let next = Arc::new(Page::new(self.shared.page_size));
            let linked = state.tail.next.set(Arc::clone(&next)).is_ok();
            debug_assert!(linked, "next page linked twice");
            state.tail = next;
        }

        state.count += 1;
        drop(state);
        self.shared.added.notify_all();
    }
}

impl<T: Clone> Default for BroadcastQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Listener<T> {
    /// Next value, blocking until the producer publishes it.
    pub fn pop(&mut self) -> T {
        self.wait_for(self.offset);

        let slot = self.offset % self.shared.page_size;
        let value = self.page.slots[slot]
            .get()
            .expect("published slot is initialized")
            .clone();
        self.offset += 1;

        if slot + 1 == self.shared.page_size {
            let next = Arc::clone(self.page.next.get().expect("next page linked before publish"));
            self.page = next;
        }

        value
    }

    fn wait_for(&self, offset: usize) {
        let mut state = self.shared.state.lock();
        while state.count <= offset {
            self.shared.added.wait(&mut state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Every listener subscribed before production observes every message.
    #[test]
    fn test_every_message_delivered() {
        const LISTENERS: usize = 16;
        const MESSAGES: i32 = 300; // a bit more than two pages

        let queue = BroadcastQueue::with_page_size(128);
        let totals: Vec<AtomicUsize> = (0..10).map(|_| AtomicUsize::new(0)).collect();

        thread::scope(|scope| {
            for _ in 0..LISTENERS {
                let mut listener = queue.listen();
                let totals = &totals;
                scope.spawn(move || loop {
                    let message = listener.pop();
                    if message < 0 {
                        break;
                    }
                    totals[message as usize].fetch_add(1, Ordering::SeqCst);
                });
            }

            for i in 0..MESSAGES {
                queue.push(i % 10);
            }
            queue.push(-1);
        });

        for (value, total) in totals.iter().enumerate() {
            let expected =
                LISTENERS * (MESSAGES as usize / 10 + usize::from(MESSAGES as usize % 10 > value));
            assert_eq!(total.load(Ordering::SeqCst), expected);
        }
    }

    /// Each listener receives each message exactly once, in order.
    #[test]
    fn test_every_message_delivered_once_in_order() {
        const MESSAGES: i32 = 9001;

        let queue = BroadcastQueue::with_page_size(4096);
        thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let mut listener = queue.listen();
                    scope.spawn(move || {
                        let mut seen = Vec::new();
                        loop {
                            let message = listener.pop();
                            if message < 0 {
                                break;
                            }
                            seen.push(message);
                        }
                        seen
                    })
                })
                .collect();

            for i in 0..MESSAGES {
                queue.push(i);
            }
            queue.push(-1);

            for handle in handles {
                let seen = handle.join().unwrap();
                assert_eq!(seen, (0..MESSAGES).collect::<Vec<_>>());
            }
        });
    }

    /// A listener subscribed after K messages sees exactly the messages
    /// from K onward.
    #[test]
    fn test_listen_after_first_messages() {
        let queue = BroadcastQueue::with_page_size(4);
        queue.push(1);
        queue.push(2);

        let mut late = queue.listen();

        queue.push(3);
        queue.push(4);

        assert_eq!(late.pop(), 3);
        assert_eq!(late.pop(), 4);
    }

    /// Listeners outlive the queue: pages are kept alive by their cursors.
    #[test]
    fn test_listener_survives_queue_drop() {
        let queue = BroadcastQueue::with_page_size(4);
        let mut listener = queue.listen();
        queue.push(String::from("still alive"));
        drop(queue);
        assert_eq!(listener.pop(), "still alive");
    }

    /// Values crossing a page boundary arrive intact.
    #[test]
    fn test_page_boundary_crossing() {
        let queue = BroadcastQueue::with_page_size(2);
        let mut listener = queue.listen();
        for i in 0..7 {
            queue.push(i);
        }
        for i in 0..7 {
            assert_eq!(listener.pop(), i);
        }
    }
}
