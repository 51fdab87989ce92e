//! # docalign-core
//!
//! The numeric and concurrency core of a bitext-mining pipeline. Given two
//! collections of base64-encoded tokenized documents (one side already
//! machine-translated into the pivot language of the other), it computes
//! character-n-gram TF-IDF vectors and emits `(score, left_id, right_id)`
//! pairs whose cosine similarity clears a threshold.
//!
//! ## Architecture
//!
//! ```text
//! input files → line producer → parse workers (base64 + n-grams + TF-IDF)
//!             → scoring workers (sparse dot against the in-memory refs)
//!             → ScoreSink (all pairs, or greedy conflict-free best matching)
//! ```
//!
//! All stages communicate over bounded blocking queues; the document
//! frequency table is built cooperatively by worker-local maps merged under
//! a mutex, then pruned and shared read-only.

/// Three-phase alignment pipeline (sample → load → score) and result sinks.
pub mod align;
/// Owning-or-shared view over a contiguous buffer; slices refcounted pools.
pub mod array_view;
/// Tuning defaults: n-gram size, DF bounds, queue capacities.
pub mod config;
/// Parallel document-frequency builder and pruning.
pub mod df;
/// Document parsing (base64 → n-gram counts) and the TF-IDF transform.
pub mod document;
/// Crate error type.
pub mod error;
/// MurmurHash3-based rolling n-gram fingerprints.
pub mod ngram;
/// Inter-thread queues: bounded MPMC, page-linked broadcast, unbounded SPSC.
pub mod queue;
/// Sorted sparse vectors with naive, galloping, and AVX-512 dot products.
pub mod sparse;

pub use error::{Error, Result};
