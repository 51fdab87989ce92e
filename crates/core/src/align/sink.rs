//! Result sinks: where scored pairs go.
//!
//! Two reporting modes share one `record` operation. All-pairs writes each
//! qualifying pair straight to the output under a mutex; best-pairs collects
//! them and, after the score phase, runs a greedy conflict-free matching.

use std::cmp::Reverse;
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use ordered_float::OrderedFloat;
use parking_lot::Mutex;

use crate::error::Result;

/// One qualifying alignment: translated (left) and target (right) ids with
/// their cosine score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub score: f32,
    pub left: usize,
    pub right: usize,
}

/// Where scoring workers report pairs that clear the threshold.
pub enum ScoreSink<W: Write> {
    /// Print every qualifying pair immediately.
    AllPairs {
        out: Mutex<W>,
        emitted: AtomicUsize,
    },
    /// Collect every qualifying pair for the matching pass.
    BestPairs { pairs: Mutex<Vec<ScoredPair>> },
}

impl<W: Write> ScoreSink<W> {
    pub fn all_pairs(out: W) -> Self {
        ScoreSink::AllPairs {
            out: Mutex::new(out),
            emitted: AtomicUsize::new(0),
        }
    }

    pub fn best_pairs() -> Self {
        ScoreSink::BestPairs {
            pairs: Mutex::new(Vec::new()),
        }
    }

    /// Report one qualifying pair. Called concurrently by scoring workers.
    pub fn record(&self, score: f32, left: usize, right: usize) -> Result<()> {
        let pair = ScoredPair { score, left, right };
        match self {
            ScoreSink::AllPairs { out, emitted } => {
                let mut out = out.lock();
                write_score(&mut *out, &pair)?;
                emitted.fetch_add(1, Ordering::Relaxed);
            }
            ScoreSink::BestPairs { pairs } => pairs.lock().push(pair),
        }
        Ok(())
    }
}

/// Print one score line: fixed-point score with 5 fractional digits, then
/// the two 1-based document ids, tab-separated.
pub fn write_score<W: Write>(out: &mut W, pair: &ScoredPair) -> Result<()> {
    writeln!(out, "{:.5}\t{}\t{}", pair.score, pair.left, pair.right)?;
    Ok(())
}

/// Greedy conflict-free one-to-one matching.
///
/// Pairs are ordered by `(score, left, right)` descending — deterministic
/// for identical inputs no matter how scoring threads interleaved — then
/// accepted top-down whenever neither document is taken yet, stopping once
/// `limit` (= min(|A|, |B|)) pairs are out.
pub fn best_pairs(mut pairs: Vec<ScoredPair>, limit: usize) -> Vec<ScoredPair> {
    pairs.sort_unstable_by_key(|pair| Reverse((OrderedFloat(pair.score), pair.left, pair.right)));

    let mut taken_left = HashSet::new();
    let mut taken_right = HashSet::new();
    let mut selected = Vec::new();

    for pair in pairs {
        if selected.len() >= limit {
            break;
        }
        if taken_left.contains(&pair.left) || taken_right.contains(&pair.right) {
            continue;
        }
        taken_left.insert(pair.left);
        taken_right.insert(pair.right);
        selected.push(pair);
    }

    selected
}
