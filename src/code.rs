//! Watermark codes: a private vocabulary permutation plus a selected cell.
//!
//! A [`WatermarkCode`] is built once per generation context from a random
//! source the caller hands in, then reused, unchanged, for every decoding
//! step of that context. The inverse permutation is derived at construction
//! because the reweighting transform needs it on every call.
//!
//! # Random sources
//!
//! Sources are explicit `rand::Rng` handles. Nothing here touches a global or
//! thread-local generator, so a code is reproducible from its source alone:
//!
//! ```rust
//! use mcmark::code::WatermarkCode;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut a = ChaCha8Rng::seed_from_u64(7);
//! let mut b = ChaCha8Rng::seed_from_u64(7);
//! let code_a = WatermarkCode::from_random(&mut a, 100, 4).unwrap();
//! let code_b = WatermarkCode::from_random(&mut b, 100, 4).unwrap();
//! assert_eq!(code_a, code_b);
//! ```
//!
//! # Batches
//!
//! [`CodeBatch::from_rngs`] draws row `i` only from source `i`, so one row's
//! draws never perturb another's.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::error::check_split_count;
use crate::{Error, Result};

/// Per-context watermark code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatermarkCode {
    /// `shuffle[i]` is the vocabulary index placed at shuffled position `i`.
    shuffle: Vec<usize>,
    /// Inverse of `shuffle`: `unshuffle[shuffle[i]] == i`.
    unshuffle: Vec<usize>,
    split_k: usize,
}

impl WatermarkCode {
    /// Draw a uniform permutation of `0..vocab_size`, then a uniform
    /// `split_k` in `0..split_count`, both from `rng`.
    pub fn from_random<R: Rng + ?Sized>(
        rng: &mut R,
        vocab_size: usize,
        split_count: usize,
    ) -> Result<Self> {
        check_split_count(vocab_size, split_count)?;
        Ok(Self::draw(rng, vocab_size, split_count))
    }

    /// Rebuild a code from a persisted shuffle and cell index.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcmark::code::WatermarkCode;
    ///
    /// let code = WatermarkCode::from_parts(vec![2, 0, 1], 1, 3).unwrap();
    /// assert_eq!(code.unshuffle(), &[1, 2, 0]);
    ///
    /// assert!(WatermarkCode::from_parts(vec![0, 0, 1], 1, 3).is_err());
    /// ```
    pub fn from_parts(shuffle: Vec<usize>, split_k: usize, split_count: usize) -> Result<Self> {
        check_split_count(shuffle.len(), split_count)?;
        if split_k >= split_count {
            return Err(Error::SplitIndexOutOfRange {
                row: 0,
                split_k,
                split_count,
            });
        }
        let unshuffle = invert_permutation(&shuffle)?;
        Ok(Self {
            shuffle,
            unshuffle,
            split_k,
        })
    }

    fn draw<R: Rng + ?Sized>(rng: &mut R, vocab_size: usize, split_count: usize) -> Self {
        let mut shuffle: Vec<usize> = (0..vocab_size).collect();
        shuffle.shuffle(rng);
        let split_k = rng.gen_range(0..split_count);

        let mut unshuffle = vec![0; vocab_size];
        for (i, &v) in shuffle.iter().enumerate() {
            unshuffle[v] = i;
        }

        Self {
            shuffle,
            unshuffle,
            split_k,
        }
    }

    /// The vocabulary permutation.
    pub fn shuffle(&self) -> &[usize] {
        &self.shuffle
    }

    /// The inverse permutation.
    pub fn unshuffle(&self) -> &[usize] {
        &self.unshuffle
    }

    /// Selected cell.
    pub const fn split_k(&self) -> usize {
        self.split_k
    }

    /// Vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.shuffle.len()
    }

    /// Gather `row` into shuffled order: `out[i] = row[shuffle[i]]`.
    pub fn permute<T: Copy>(&self, row: &[T]) -> Vec<T> {
        self.shuffle.iter().map(|&v| row[v]).collect()
    }

    /// Gather a shuffled row back into vocabulary order:
    /// `out[v] = row[unshuffle[v]]`.
    pub fn unpermute<T: Copy>(&self, row: &[T]) -> Vec<T> {
        self.unshuffle.iter().map(|&i| row[i]).collect()
    }
}

/// Inverse of `shuffle`, or an error if it is not a permutation.
fn invert_permutation(shuffle: &[usize]) -> Result<Vec<usize>> {
    let n = shuffle.len();
    let mut inverse = vec![usize::MAX; n];
    for (i, &v) in shuffle.iter().enumerate() {
        if v >= n {
            return Err(Error::invalid_permutation(format!(
                "index {v} at position {i} is out of range for vocab size {n}"
            )));
        }
        if inverse[v] != usize::MAX {
            return Err(Error::invalid_permutation(format!(
                "index {v} appears more than once"
            )));
        }
        inverse[v] = i;
    }
    Ok(inverse)
}

/// Batch-aligned watermark codes, one per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBatch {
    rows: Vec<WatermarkCode>,
}

impl CodeBatch {
    /// Stack existing codes; they must share one vocabulary size.
    pub fn new(rows: Vec<WatermarkCode>) -> Result<Self> {
        if let Some(first) = rows.first() {
            let expected = first.vocab_size();
            for (row, code) in rows.iter().enumerate() {
                if code.vocab_size() != expected {
                    return Err(Error::VocabSizeMismatch {
                        row,
                        expected,
                        actual: code.vocab_size(),
                    });
                }
            }
        }
        Ok(Self { rows })
    }

    /// Draw one code per source.
    ///
    /// All arguments are checked before any source is consumed; a length
    /// mismatch between `rngs` and `batch_size` draws nothing.
    pub fn from_rngs<R: Rng>(
        rngs: &mut [R],
        batch_size: usize,
        vocab_size: usize,
        split_count: usize,
    ) -> Result<Self> {
        if rngs.len() != batch_size {
            return Err(Error::BatchSizeMismatch {
                what: "random sources",
                expected: batch_size,
                actual: rngs.len(),
            });
        }
        check_split_count(vocab_size, split_count)?;

        let rows: Vec<WatermarkCode> = rngs
            .iter_mut()
            .map(|rng| WatermarkCode::draw(rng, vocab_size, split_count))
            .collect();

        debug!(batch_size, vocab_size, split_count, "built watermark code batch");
        Ok(Self { rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Code for one row.
    pub fn get(&self, row: usize) -> Option<&WatermarkCode> {
        self.rows.get(row)
    }

    /// All row codes in order.
    pub fn rows(&self) -> &[WatermarkCode] {
        &self.rows
    }

    /// Iterate over row codes.
    pub fn iter(&self) -> std::slice::Iter<'_, WatermarkCode> {
        self.rows.iter()
    }
}

impl From<WatermarkCode> for CodeBatch {
    fn from(code: WatermarkCode) -> Self {
        Self { rows: vec![code] }
    }
}

impl<'a> IntoIterator for &'a CodeBatch {
    type Item = &'a WatermarkCode;
    type IntoIter = std::slice::Iter<'a, WatermarkCode>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng(seed: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(seed)
    }

    #[test]
    fn test_from_random_is_permutation() {
        let code = WatermarkCode::from_random(&mut rng(1), 50, 5).unwrap();
        let mut sorted = code.shuffle().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert!(code.split_k() < 5);
        assert_eq!(code.vocab_size(), 50);
    }

    #[test]
    fn test_unshuffle_is_inverse() {
        let code = WatermarkCode::from_random(&mut rng(2), 64, 4).unwrap();
        for (i, &v) in code.shuffle().iter().enumerate() {
            assert_eq!(code.unshuffle()[v], i);
        }
    }

    #[test]
    fn test_from_random_rejects_bad_split() {
        assert!(matches!(
            WatermarkCode::from_random(&mut rng(0), 4, 0),
            Err(Error::InvalidSplitCount { .. })
        ));
        assert!(matches!(
            WatermarkCode::from_random(&mut rng(0), 4, 5),
            Err(Error::InvalidSplitCount {
                split_count: 5,
                vocab_size: 4
            })
        ));
    }

    #[test]
    fn test_same_seed_same_code() {
        let a = WatermarkCode::from_random(&mut rng(42), 1000, 8).unwrap();
        let b = WatermarkCode::from_random(&mut rng(42), 1000, 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_different_code() {
        let a = WatermarkCode::from_random(&mut rng(1), 1000, 8).unwrap();
        let b = WatermarkCode::from_random(&mut rng(2), 1000, 8).unwrap();
        assert_ne!(a.shuffle(), b.shuffle());
    }

    #[test]
    fn test_split_k_covers_range() {
        let mut source = rng(3);
        let mut seen = [false; 4];
        for _ in 0..200 {
            let code = WatermarkCode::from_random(&mut source, 8, 4).unwrap();
            seen[code.split_k()] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_from_parts_validation() {
        assert!(WatermarkCode::from_parts(vec![1, 0], 0, 2).is_ok());
        assert!(matches!(
            WatermarkCode::from_parts(vec![1, 2], 0, 2),
            Err(Error::InvalidPermutation(_))
        ));
        assert!(matches!(
            WatermarkCode::from_parts(vec![1, 1], 0, 2),
            Err(Error::InvalidPermutation(_))
        ));
        assert!(matches!(
            WatermarkCode::from_parts(vec![1, 0], 2, 2),
            Err(Error::SplitIndexOutOfRange { split_k: 2, .. })
        ));
        assert!(matches!(
            WatermarkCode::from_parts(vec![], 0, 1),
            Err(Error::InvalidVocabSize)
        ));
    }

    #[test]
    fn test_from_parts_matches_drawn_code() {
        let drawn = WatermarkCode::from_random(&mut rng(9), 32, 4).unwrap();
        let replayed =
            WatermarkCode::from_parts(drawn.shuffle().to_vec(), drawn.split_k(), 4).unwrap();
        assert_eq!(drawn, replayed);
    }

    #[test]
    fn test_permute_unpermute() {
        let code = WatermarkCode::from_parts(vec![2, 0, 3, 1], 0, 2).unwrap();
        let row = [10, 11, 12, 13];
        let shuffled = code.permute(&row);
        assert_eq!(shuffled, vec![12, 10, 13, 11]);
        assert_eq!(code.unpermute(&shuffled), row.to_vec());
    }

    #[test]
    fn test_batch_from_rngs() {
        let mut rngs = vec![rng(1), rng(2), rng(3)];
        let batch = CodeBatch::from_rngs(&mut rngs, 3, 100, 4).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(!batch.is_empty());
        assert_ne!(batch.rows()[0].shuffle(), batch.rows()[1].shuffle());
    }

    #[test]
    fn test_batch_rows_match_single_draws() {
        let mut rngs = vec![rng(10), rng(11)];
        let batch = CodeBatch::from_rngs(&mut rngs, 2, 64, 4).unwrap();

        let single = WatermarkCode::from_random(&mut rng(11), 64, 4).unwrap();
        assert_eq!(batch.get(1), Some(&single));
    }

    #[test]
    fn test_batch_size_mismatch_draws_nothing() {
        let mut rngs = vec![rng(5), rng(6)];
        let err = CodeBatch::from_rngs(&mut rngs, 3, 10, 2).unwrap_err();
        assert_eq!(
            err,
            Error::BatchSizeMismatch {
                what: "random sources",
                expected: 3,
                actual: 2
            }
        );

        // Sources are untouched: drawing now matches a fresh source.
        let after = WatermarkCode::from_random(&mut rngs[0], 10, 2).unwrap();
        let fresh = WatermarkCode::from_random(&mut rng(5), 10, 2).unwrap();
        assert_eq!(after, fresh);
    }

    #[test]
    fn test_batch_bad_split_draws_nothing() {
        let mut rngs = vec![rng(5)];
        assert!(CodeBatch::from_rngs(&mut rngs, 1, 10, 11).is_err());
        let after = WatermarkCode::from_random(&mut rngs[0], 10, 2).unwrap();
        let fresh = WatermarkCode::from_random(&mut rng(5), 10, 2).unwrap();
        assert_eq!(after, fresh);
    }

    #[test]
    fn test_batch_new_rejects_mixed_vocab() {
        let a = WatermarkCode::from_random(&mut rng(1), 10, 2).unwrap();
        let b = WatermarkCode::from_random(&mut rng(1), 12, 2).unwrap();
        assert!(matches!(
            CodeBatch::new(vec![a, b]),
            Err(Error::VocabSizeMismatch {
                row: 1,
                expected: 10,
                actual: 12
            })
        ));
    }

    #[test]
    fn test_batch_from_single() {
        let code = WatermarkCode::from_random(&mut rng(1), 10, 2).unwrap();
        let batch = CodeBatch::from(code.clone());
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.iter().next(), Some(&code));
    }
}
