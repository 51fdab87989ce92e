//! Inter-thread queues used by the pipeline and the filter tools.
//!
//! - [`BoundedQueue`]: fixed-capacity MPMC handoff with backpressure and
//!   overflow/underflow diagnostics — the pipeline's workhorse.
//! - [`BroadcastQueue`]: one producer, many consumers, every consumer sees
//!   the full stream from the moment it subscribed (page-linked).
//! - [`SingleProducerQueue`]: unbounded SPSC with a non-blocking emptiness
//!   probe, used by the filters' record-descriptor protocol.
//!
//! End-of-stream is always a poison value by caller convention (`None`, a
//! zero count, an empty list); queues themselves never close.

pub mod bounded;
pub mod broadcast;
pub mod single_producer;

pub use bounded::{BoundedQueue, QueueStats};
pub use broadcast::{BroadcastQueue, Listener};
pub use single_producer::SingleProducerQueue;
