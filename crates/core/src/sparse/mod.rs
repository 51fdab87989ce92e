//! Sorted sparse vectors and their dot products.
//!
//! A [`SparseVector`] holds two parallel arrays: strictly ascending unique
//! `u64` indices and their `f32` values. The dot product picks between a
//! two-pointer linear merge, a galloping binary-search intersection (when
//! one side is much larger), and an AVX-512CD variant (when the CPU has it
//! and the one-time self-check against the scalar path passed).

use crate::config;
use crate::ngram::NGram;

pub mod simd;

/// Sentinel index used to pad the indices array to a whole SIMD block. Never
/// produced as a real fingerprint lane match because padded positions sit at
/// or past the logical length.
pub(crate) const PAD_INDEX: NGram = NGram::MAX;

/// Sparse vector as sorted parallel (index, value) arrays.
///
/// The indices array may carry up to three trailing [`PAD_INDEX`] sentinels
/// past the logical length (see [`pad_for_simd`](SparseVector::pad_for_simd));
/// `len()` always reports the logical length.
#[derive(Debug, Clone, Default)]
pub struct SparseVector {
    indices: Vec<NGram>,
    values: Vec<f32>,
}

impl SparseVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        SparseVector {
            indices: Vec::with_capacity(capacity + (4 - capacity % 4) % 4),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Logical number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The sorted indices and their values, without any SIMD padding.
    pub fn parts(&self) -> (&[NGram], &[f32]) {
        (&self.indices[..self.values.len()], &self.values)
    }

    /// Indices including any SIMD padding.
    pub(crate) fn padded_indices(&self) -> &[NGram] {
        &self.indices
    }

    /// Mutable slot for `index`, inserted (as 0.0) if absent. Keeps the
    /// indices strictly ascending and unique. Drops any padding first.
    pub fn insert(&mut self, index: NGram) -> &mut f32 {
        self.indices.truncate(self.values.len());
        match self.indices.binary_search(&index) {
            Ok(i) => &mut self.values[i],
            Err(i) => {
                self.indices.insert(i, index);
                self.values.insert(i, 0.0);
                &mut self.values[i]
            }
        }
    }

    /// Value at `index`, or 0.0 if absent.
    pub fn get(&self, index: NGram) -> f32 {
        let (indices, values) = self.parts();
        match indices.binary_search(&index) {
            Ok(i) => values[i],
            Err(_) => 0.0,
        }
    }

    /// In-place scalar division. The divisor must be nonzero; absent
    /// entries stay absent (0 / d = 0).
    pub fn div_assign(&mut self, divisor: f32) {
        assert!(divisor != 0.0, "division of a sparse vector by zero");
        for value in &mut self.values {
            *value /= divisor;
        }
    }

    /// Pad the indices array with sentinels to a whole number of 4-lane
    /// blocks so the AVX-512 path can load full blocks unconditionally.
    pub fn pad_for_simd(&mut self) {
        self.indices.truncate(self.values.len());
        let pad = (4 - self.indices.len() % 4) % 4;
        for _ in 0..pad {
            self.indices.push(PAD_INDEX);
        }
    }

    /// Dot product over the intersecting indices.
    ///
    /// Empty operands short-circuit to 0. The smaller operand always drives
    /// the intersection; a size ratio above
    /// [`DOT_GALLOP_RATIO`](config::DOT_GALLOP_RATIO) switches to galloping.
    pub fn dot(&self, right: &SparseVector) -> f32 {
        if self.is_empty() || right.is_empty() {
            return 0.0;
        }

        // The right vector is always the larger one.
        if self.len() > right.len() {
            return right.dot(self);
        }

        if right.len() / self.len() > config::DOT_GALLOP_RATIO {
            return self.dot_search(right);
        }

        #[cfg(target_arch = "x86_64")]
        if simd::conflict_dot_usable() {
            return simd::dot_conflict(self, right);
        }

        self.dot_naive(right)
    }

    /// Galloping intersection: walk the smaller side linearly, binary-search
    /// each index in the remaining suffix of the larger side.
    pub fn dot_search(&self, right: &SparseVector) -> f32 {
        let (li, lv) = self.parts();
        let (ri, rv) = right.parts();

        let mut sum = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < li.len() && j < ri.len() {
            if li[i] < ri[j] {
                i += 1;
            } else if ri[j] < li[i] {
                j += ri[j..].partition_point(|&index| index < li[i]);
            } else {
                sum += lv[i] * rv[j];
                i += 1;
                if i < li.len() {
                    j += ri[j..].partition_point(|&index| index < li[i]);
                }
            }
        }

        sum
    }

    /// Classic two-pointer merge intersection.
    pub fn dot_naive(&self, right: &SparseVector) -> f32 {
        let (li, lv) = self.parts();
        let (ri, rv) = right.parts();

        let mut sum = 0.0;
        let mut i = 0;
        let mut j = 0;

        while i < li.len() && j < ri.len() {
            if li[i] < ri[j] {
                i += 1;
            } else if ri[j] < li[i] {
                j += 1;
            } else {
                sum += lv[i] * rv[j];
                i += 1;
                j += 1;
            }
        }

        sum
    }
}

impl FromIterator<(NGram, f32)> for SparseVector {
    /// Builds from arbitrary-order pairs; later duplicates overwrite.
    fn from_iter<I: IntoIterator<Item = (NGram, f32)>>(iter: I) -> Self {
        let mut vec = SparseVector::new();
        for (index, value) in iter {
            *vec.insert(index) = value;
        }
        vec
    }
}
