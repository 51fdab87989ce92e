//! Command-line tools around [`docalign_core`]: the `docalign` aligner and
//! the two line filters, `b64filter` and `foldfilter`.
//!
//! The filters solve the same hard problem twice: pipeline a line-oriented
//! child process while preserving record boundaries across its stdin and
//! stdout under backpressure. The feeder always enqueues a record
//! descriptor *before* sending the corresponding bytes to the child, which
//! is what lets the reader flag a child that produces unsolicited output.

/// Base64-wrapped line filter: whole documents through a per-line child.
pub mod b64;
/// Delimiter-aware UTF-8 line wrapping filter.
pub mod fold;
/// Child process with piped stdin/stdout and reliable teardown.
pub mod subprocess;

pub use docalign_core::{Error, Result};
