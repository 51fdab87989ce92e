//! Document parsing and the TF-IDF transform.
//!
//! A document arrives as one base64-encoded line of whitespace-separated
//! tokens. Parsing decodes it and counts rolling n-gram fingerprints into a
//! transient [`Document`]; the TF-IDF transform turns those counts into a
//! persistent [`DocumentRef`] holding an L2-normalized sparse vector.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::df::DfTable;
use crate::error::{Error, Result};
use crate::ngram::{NGram, NGramIter};
use crate::sparse::SparseVector;

/// Transient parse result: n-gram frequencies of one document.
#[derive(Debug, Default)]
pub struct Document {
    /// 1-based ordinal of the source line in its input file.
    pub id: usize,
    /// n-gram → occurrence count within this document.
    pub vocab: HashMap<NGram, u64>,
}

/// Persistent, score-ready form of a document.
#[derive(Debug, Default)]
pub struct DocumentRef {
    /// 1-based ordinal of the source line in its input file.
    pub id: usize,
    /// TF-IDF weights as a sorted sparse vector, L2-normalized (or empty /
    /// all-zero when nothing in the document survives the DF table).
    pub wordvec: SparseVector,
}

/// Parse one base64-encoded line into n-gram counts.
///
/// `id` is the 1-based line number, kept for error messages and the
/// document identifier.
pub fn read_document(encoded: &str, id: usize, ngram_size: usize) -> Result<Document> {
    let body = STANDARD
        .decode(encoded.trim_end())
        .map_err(|source| Error::Base64 { line: id, source })?;

    let mut vocab = HashMap::new();
    for ngram in NGramIter::new(&body, ngram_size) {
        *vocab.entry(ngram).or_insert(0) += 1;
    }

    Ok(Document { id, vocab })
}

/// Smoothed TF-IDF weight: `ln(tf + 1) * ln(D / (1 + df))`.
#[inline]
fn tfidf(tf: u64, document_count: usize, df: usize) -> f32 {
    ((tf + 1) as f32).ln() * (document_count as f32 / (1.0 + df as f32)).ln()
}

/// Weight a parsed document against the DF table and L2-normalize.
///
/// n-grams absent from the (pruned) DF table contribute nothing. A document
/// with no surviving n-grams keeps an empty wordvec — its norm is 0 and it
/// can never clear a score threshold.
pub fn calculate_tfidf(document: &Document, document_count: usize, df: &DfTable) -> DocumentRef {
    let mut wordvec = SparseVector::with_capacity(document.vocab.len());
    let mut norm_squared = 0.0f32;

    for (&ngram, &tf) in &document.vocab {
        let Some(&term_df) = df.get(&ngram) else {
            continue;
        };

        let weight = tfidf(tf, document_count, term_df);
        norm_squared += weight * weight;
        *wordvec.insert(ngram) = weight;
    }

    let norm = norm_squared.sqrt();
    if norm > 0.0 {
        wordvec.div_assign(norm);
    }
    wordvec.pad_for_simd();

    DocumentRef {
        id: document.id,
        wordvec,
    }
}

/// Alignment score of two documents: dot product of their normalized
/// TF-IDF vectors (cosine similarity).
pub fn calculate_alignment(left: &DocumentRef, right: &DocumentRef) -> f32 {
    left.wordvec.dot(&right.wordvec)
}
