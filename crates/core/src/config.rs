//! Tuning defaults for docalign.
//!
//! These are compile-time constants; runtime configuration is CLI arguments
//! only. No environment variables, no config files.

/// Default n-gram window size in tokens.
///
/// Bigrams are a good trade-off between discrimination and DF table size for
/// tokenized web text. Range in practice: 1–4.
pub const DEFAULT_NGRAM_SIZE: usize = 2;

/// Default minimum score for a pair to be reported.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Default DF sample rate: build the DF table from every n-th document.
pub const DEFAULT_DF_SAMPLE_RATE: usize = 1;

/// Default lower DF bound, inclusive. An n-gram seen in fewer documents is
/// dropped from the table. Should scale with the sample rate (see
/// [`crate::df::DfBuilder`] for why sampled counts overshoot).
pub const DEFAULT_MIN_COUNT: usize = 2;

/// Default upper DF bound, inclusive. An n-gram seen in more documents than
/// this carries no alignment signal (boilerplate, markup) and is dropped.
pub const DEFAULT_MAX_COUNT: usize = 1000;

/// Bounded queue capacity per worker for the sample and load phases.
pub const LINE_QUEUE_PER_WORKER: usize = 128;

/// Bounded queue capacity per worker for parsed refs flowing into scoring.
pub const SCORE_QUEUE_PER_WORKER: usize = 256;

/// Hard cap on base64/parse reader threads in the score phase. Decoding is
/// never the bottleneck; scoring is.
pub const MAX_READ_THREADS: usize = 4;

/// Values per page in the page-linked broadcast queue.
pub const BROADCAST_PAGE_SIZE: usize = 4096;

/// Size-ratio above which the sparse dot product switches from the linear
/// two-pointer merge to a galloping (binary search) intersection.
pub const DOT_GALLOP_RATIO: usize = 10;

/// Default column width for the fold filter.
pub const DEFAULT_FOLD_WIDTH: usize = 40;
