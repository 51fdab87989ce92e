//! AVX-512CD dot product for sorted sparse vectors.
//!
//! Loads four 64-bit indices of each operand into one `__m512i` (left in
//! lanes 0–3, right in lanes 4–7) and uses `VPCONFLICTQ` to find cross
//! matches between the two halves in a single instruction. Falls back to
//! the scalar merge on CPUs without AVX-512CD, and — because the scalar
//! path is authoritative — also when the one-time self-check against the
//! scalar result is not exactly zero.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;
#[cfg(target_arch = "x86_64")]
use std::sync::OnceLock;

#[cfg(target_arch = "x86_64")]
use super::{SparseVector, PAD_INDEX};
#[cfg(target_arch = "x86_64")]
use crate::ngram::NGram;

/// Whether the conflict-detection dot product may be used: the CPU must
/// report AVX-512F + AVX-512CD and the self-check must have passed.
#[cfg(target_arch = "x86_64")]
pub(crate) fn conflict_dot_usable() -> bool {
    static USABLE: OnceLock<bool> = OnceLock::new();
    *USABLE.get_or_init(|| {
        if !is_x86_feature_detected!("avx512f") || !is_x86_feature_detected!("avx512cd") {
            return false;
        }
        self_check()
    })
}

/// Compare the vector and scalar paths on a deterministic fixture. Any
/// nonzero difference disables the vector path for the process lifetime.
#[cfg(target_arch = "x86_64")]
fn self_check() -> bool {
    let (a, b) = fixture();
    let pairs: [(&SparseVector, &SparseVector); 2] = [(&a, &b), (&b, &a)];
    pairs.iter().all(|&(left, right)| {
        let scalar = left.dot_naive(right);
        let vector = dot_conflict(left, right);
        (scalar - vector) == 0.0
    })
}

/// Two overlapping sparse vectors from a fixed xorshift sequence, padded.
#[cfg(target_arch = "x86_64")]
fn fixture() -> (SparseVector, SparseVector) {
    let mut state: u64 = 0x243f_6a88_85a3_08d3;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut a = SparseVector::new();
    let mut b = SparseVector::new();
    for index in 0..257u64 {
        if next() % 3 != 0 {
            *a.insert(index) = (next() % 1000) as f32 / 64.0;
        }
        if next() % 3 != 0 {
            *b.insert(index) = (next() % 1000) as f32 / 64.0;
        }
    }
    a.pad_for_simd();
    b.pad_for_simd();
    (a, b)
}

/// Conflict-detection dot product. Both operands must be non-empty; operands
/// whose indices are not already block-padded are padded into scratch
/// buffers (the pipeline pads refs once after TF-IDF, so the steady-state
/// scoring path takes the no-copy branch).
#[cfg(target_arch = "x86_64")]
pub(crate) fn dot_conflict(left: &SparseVector, right: &SparseVector) -> f32 {
    debug_assert!(!left.is_empty() && !right.is_empty());

    let (li, lv) = left.parts();
    let (ri, rv) = right.parts();

    let l_scratch;
    let l_padded: &[NGram] = if is_block_padded(left) {
        left.padded_indices()
    } else {
        l_scratch = pad_copy(li);
        &l_scratch
    };
    let r_scratch;
    let r_padded: &[NGram] = if is_block_padded(right) {
        right.padded_indices()
    } else {
        r_scratch = pad_copy(ri);
        &r_scratch
    };

    unsafe { dot_conflict_blocks(l_padded, lv, r_padded, rv) }
}

#[cfg(target_arch = "x86_64")]
fn is_block_padded(vec: &SparseVector) -> bool {
    let padded = vec.padded_indices().len();
    padded % 4 == 0 && padded >= vec.len()
}

#[cfg(target_arch = "x86_64")]
fn pad_copy(indices: &[NGram]) -> Vec<NGram> {
    let mut padded = indices.to_vec();
    padded.resize(indices.len().next_multiple_of(4), PAD_INDEX);
    padded
}

/// `li`/`ri` are whole 4-lane blocks (sentinel-padded); `lv`/`rv` carry the
/// logical lengths. Matches are accumulated in ascending index order, the
/// same order as the scalar merge, so the result is bitwise identical.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx512f,avx512cd")]
unsafe fn dot_conflict_blocks(li: &[NGram], lv: &[f32], ri: &[NGram], rv: &[f32]) -> f32 {
    debug_assert!(li.len() % 4 == 0 && ri.len() % 4 == 0);

    let l_len = lv.len();
    let r_len = rv.len();

    let mut lb = 0;
    let mut rb = 0;
    let mut sum = 0.0f32;
    let mut buf = [0i64; 8];

    while lb < l_len && rb < r_len {
        // Left block in lanes 0-3; right block in lanes 4-7. The right base
        // pointer is rewound by four lanes so the 0xF0 mask lands its block
        // in the upper half; the masked-off lower lanes are never read.
        let block = _mm512_maskz_loadu_epi64(0x0F, li.as_ptr().add(lb) as *const i64);
        let block = _mm512_mask_loadu_epi64(
            block,
            0xF0,
            (ri.as_ptr().add(rb) as *const i64).wrapping_sub(4),
        );

        // For each right lane, a set bit marks a lower lane holding the same
        // value. Masking to 0x0F keeps only cross matches against the left
        // half; both halves are internally unique except for the sentinel
        // padding, which the bounds checks below reject.
        let conflicts = _mm512_conflict_epi64(block);
        _mm512_storeu_epi64(buf.as_mut_ptr(), conflicts);

        for j in 0..4 {
            let cross = (buf[4 + j] as u64) & 0x0F;
            if cross != 0 {
                let i = cross.trailing_zeros() as usize;
                if lb + i < l_len && rb + j < r_len {
                    sum += lv[lb + i] * rv[rb + j];
                }
            }
        }

        // Advance whichever block is behind; on a tie both can jump.
        let l_last = li[lb + 3];
        let r_last = ri[rb + 3];
        if l_last < r_last {
            lb += 4;
        } else if r_last < l_last {
            rb += 4;
        } else {
            lb += 4;
            rb += 4;
        }
    }

    sum
}

#[cfg(all(test, target_arch = "x86_64"))]
mod tests {
    use super::*;

    fn sv(pairs: &[(NGram, f32)]) -> SparseVector {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_conflict_matches_naive_on_fixture() {
        if !conflict_dot_usable() {
            return; // no AVX-512CD on this machine
        }
        let (a, b) = fixture();
        assert_eq!(a.dot_naive(&b), dot_conflict(&a, &b));
    }

    #[test]
    fn test_conflict_handles_unpadded_operands() {
        if !is_x86_feature_detected!("avx512f") || !is_x86_feature_detected!("avx512cd") {
            return;
        }
        let a = sv(&[(0, 0.0), (1, 0.1), (2, 0.2), (3, 0.3), (4, 0.4), (6, 0.6)]);
        let b = sv(&[(0, 0.5), (1, 0.5), (3, 0.5), (4, 0.5), (6, 0.5), (9, 0.5)]);
        assert_eq!(a.dot_naive(&b), dot_conflict(&a, &b));
        assert_eq!(b.dot_naive(&a), dot_conflict(&b, &a));
    }

    #[test]
    fn test_conflict_uneven_lengths() {
        if !is_x86_feature_detected!("avx512f") || !is_x86_feature_detected!("avx512cd") {
            return;
        }
        let small = sv(&[(7, 2.0)]);
        let large: SparseVector = (0..64u64).map(|i| (i, 1.0)).collect();
        assert_eq!(small.dot_naive(&large), dot_conflict(&small, &large));
    }
}
