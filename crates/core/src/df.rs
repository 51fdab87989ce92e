//! Document-frequency table, built cooperatively by worker threads.
//!
//! Each worker counts n-grams into a thread-local map (one increment per
//! document an n-gram occurs in, not per occurrence) and merges it into the
//! shared table exactly once, on exit, under a mutex. Merged counts are
//! multiplied by the DF sample rate to reconstruct an estimate for the full
//! corpus.
//!
//! Note the estimate overshoots for sample rates above 1: local counts are
//! already per-sampled-document. This reproduces the reference pipeline's
//! behavior on purpose; `min_count` is expected to scale with the sample
//! rate.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::document::Document;
use crate::ngram::NGram;

/// n-gram → number of documents it occurs in.
pub type DfTable = HashMap<NGram, usize>;

/// Shared accumulator for worker-local DF maps.
pub struct DfBuilder {
    global: Mutex<DfTable>,
    sample_rate: usize,
}

impl DfBuilder {
    pub fn new(sample_rate: usize) -> Self {
        DfBuilder {
            global: Mutex::new(DfTable::new()),
            sample_rate: sample_rate.max(1),
        }
    }

    /// Count a parsed document into a worker-local map: +1 per distinct
    /// n-gram.
    pub fn count_document(local: &mut DfTable, document: &Document) {
        for &ngram in document.vocab.keys() {
            *local.entry(ngram).or_insert(0) += 1;
        }
    }

    /// Merge a worker-local map into the shared table, compensating for
    /// having read only every n-th document.
    pub fn merge(&self, local: DfTable) {
        let mut global = self.global.lock();
        for (ngram, count) in local {
            *global.entry(ngram).or_insert(0) += count * self.sample_rate;
        }
    }

    /// Tear down into the accumulated table. Call after all workers joined.
    pub fn into_table(self) -> DfTable {
        self.global.into_inner()
    }
}

/// Drop entries outside the inclusive `[min_count, max_count]` band.
/// Returns the number of entries removed.
pub fn prune(df: &mut DfTable, min_count: usize, max_count: usize) -> usize {
    let before = df.len();
    df.retain(|_, &mut count| count >= min_count && count <= max_count);
    before - df.len()
}
