//! Partition of shuffled vocabulary positions into `n` contiguous cells.
//!
//! A single boundary function covers every `(vocab_size, n)` pair:
//!
//! ```text
//! b_i = round(V * i / n),  i = 0..=n        (ties round to even)
//! cell j = b_j .. b_{j+1}
//! ```
//!
//! When `n` divides `V` every cell has width `V / n`; when `n == V` every
//! cell is a singleton. Both cases are exact because the boundary is computed
//! with integer arithmetic, never through a float quotient.
//!
//! For `1 <= n <= V` consecutive boundaries always differ by at least one
//! (`V/n >= 1` and rounding is monotone), so no cell is empty.

use std::ops::Range;

use crate::error::check_split_count;
use crate::Result;

/// Boundary indices `b_0 = 0 < b_1 < ... < b_n = vocab_size`.
///
/// Callers are expected to have validated `1 <= n <= vocab_size`.
///
/// # Examples
///
/// ```rust
/// use mcmark::partition::boundaries;
///
/// assert_eq!(boundaries(8, 4), vec![0, 2, 4, 6, 8]);
/// assert_eq!(boundaries(5, 2), vec![0, 2, 5]);
/// assert_eq!(boundaries(7, 3), vec![0, 2, 5, 7]);
/// ```
pub fn boundaries(vocab_size: usize, n: usize) -> Vec<usize> {
    (0..=n).map(|i| rounded_ratio(vocab_size * i, n)).collect()
}

/// `round(num / den)` with ties to even, in exact integer arithmetic.
fn rounded_ratio(num: usize, den: usize) -> usize {
    let q = num / den;
    let twice_r = 2 * (num % den);
    if twice_r > den || (twice_r == den && q % 2 == 1) {
        q + 1
    } else {
        q
    }
}

/// An `n`-way split of the positions `0..vocab_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    bounds: Vec<usize>,
    /// Cell width when every cell has the same size.
    uniform_width: Option<usize>,
}

impl Partition {
    /// Build the partition, validating `1 <= n <= vocab_size`.
    pub fn new(vocab_size: usize, n: usize) -> Result<Self> {
        check_split_count(vocab_size, n)?;
        let bounds = boundaries(vocab_size, n);
        debug_assert!(bounds.windows(2).all(|w| w[0] < w[1]));
        let uniform_width = (vocab_size % n == 0).then_some(vocab_size / n);
        Ok(Self {
            bounds,
            uniform_width,
        })
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.bounds.len() - 1
    }

    /// Number of positions covered.
    pub fn vocab_size(&self) -> usize {
        self.bounds[self.bounds.len() - 1]
    }

    /// Boundary indices, `cell_count() + 1` of them.
    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    /// Whether all cells have the same width.
    pub fn is_uniform(&self) -> bool {
        self.uniform_width.is_some()
    }

    /// Positions belonging to cell `j`.
    pub fn cell(&self, j: usize) -> Range<usize> {
        self.bounds[j]..self.bounds[j + 1]
    }

    /// Iterate over all cells in order.
    pub fn cells(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        self.bounds.windows(2).map(|w| w[0]..w[1])
    }

    /// Cell containing `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position >= vocab_size()`.
    pub fn cell_of(&self, position: usize) -> usize {
        assert!(position < self.vocab_size(), "position out of range");
        match self.uniform_width {
            Some(width) => position / width,
            None => self.bounds.partition_point(|&b| b <= position) - 1,
        }
    }

    /// Per-cell sums of `values`, which must be indexed by position.
    pub fn cell_sums(&self, values: &[f64]) -> Vec<f64> {
        debug_assert_eq!(values.len(), self.vocab_size());
        self.cells().map(|cell| values[cell].iter().sum()).collect()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn vocab_and_n() -> impl Strategy<Value = (usize, usize)> {
        (1usize..500).prop_flat_map(|v| (Just(v), 1..=v))
    }

    proptest! {
        #[test]
        fn prop_cells_cover_disjointly((v, n) in vocab_and_n()) {
            let p = Partition::new(v, n).unwrap();
            let mut seen = vec![0u32; v];
            for cell in p.cells() {
                for pos in cell {
                    seen[pos] += 1;
                }
            }
            prop_assert!(seen.iter().all(|&c| c == 1));
        }

        #[test]
        fn prop_cells_non_empty_and_balanced((v, n) in vocab_and_n()) {
            let p = Partition::new(v, n).unwrap();
            let widths: Vec<usize> = p.cells().map(|c| c.len()).collect();
            let min = *widths.iter().min().unwrap();
            let max = *widths.iter().max().unwrap();
            prop_assert!(min >= 1);
            prop_assert!(max - min <= 1);
        }

        #[test]
        fn prop_cell_of_matches_ranges((v, n) in vocab_and_n()) {
            let p = Partition::new(v, n).unwrap();
            for (j, cell) in p.cells().enumerate() {
                for pos in cell {
                    prop_assert_eq!(p.cell_of(pos), j);
                }
            }
        }
    }
}
