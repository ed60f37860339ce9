//! Multi-channel reweighting of next-token distributions.
//!
//! Biases probability mass toward the cell of a private vocabulary
//! partition selected by a [`WatermarkCode`], while keeping the result a
//! valid distribution.
//!
//! # Algorithm
//!
//! Per batch row, with `n` cells:
//!
//! 1. Gather logits into shuffled order and softmax them into `p`.
//! 2. Sum `p` over each cell: `s_0..s_{n-1}`.
//! 3. `scale_j = min(n, 1/s_j)`: the most cell `j` could be amplified.
//! 4. `overflow_j = max(0, (n*s_j - 1) / s_j)`: slack cell `j` can give up.
//! 5. The target cell `k = split_k` takes `scale_k * s_k` of the mass.
//! 6. `fill = (1 - scale_k * s_k) / Σ_j overflow_j * s_j`.
//! 7. Every other cell is scaled by `fill * overflow_j`.
//! 8. Scale, clamp at `0`, take the log (`0` becomes `-∞`).
//! 9. Gather back into vocabulary order.
//!
//! A cell with zero mass gets scale `0` and overflow `0` outright, so no
//! `1/0` ever reaches the arithmetic.
//!
//! Larger `n` approaches per-token control; `n == vocab_size` is exactly
//! per-token.
//!
//! # Example
//!
//! ```rust
//! use mcmark::code::CodeBatch;
//! use mcmark::distribution::is_valid_distribution;
//! use mcmark::reweight::{McReweight, Reweight};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rngs = vec![ChaCha8Rng::seed_from_u64(1), ChaCha8Rng::seed_from_u64(2)];
//! let codes = CodeBatch::from_rngs(&mut rngs, 2, 6, 3).unwrap();
//!
//! let logits = vec![vec![0.1, 1.2, -0.3, 0.8, 2.0, 0.0]; 2];
//! let reweighted = McReweight::new(3).unwrap().reweight_logits(&codes, &logits).unwrap();
//!
//! for row in &reweighted {
//!     assert!(is_valid_distribution(row, 1e-5));
//! }
//! ```

use std::fmt;

use tracing::{debug, trace};

use crate::code::{CodeBatch, WatermarkCode};
use crate::config::WatermarkConfig;
use crate::distribution::{check_logits, softmax};
use crate::error::check_split_count;
use crate::partition::Partition;
use crate::{Error, Result};

/// A logits transform keyed by a batch of watermark codes.
pub trait Reweight {
    /// Reweight a `batch × vocab_size` block of logits.
    ///
    /// Returns a new block of the same shape; `logits` is left untouched.
    fn reweight_logits(&self, code: &CodeBatch, logits: &[Vec<f32>]) -> Result<Vec<Vec<f32>>>;
}

/// Multi-channel reweight with `n` partition cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McReweight {
    n: usize,
}

/// Per-cell intermediate values of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct CellScales {
    /// Maximum amplification per cell, `0` for empty cells.
    pub scales: Vec<f64>,
    /// Spare capacity per cell beyond its uniform share.
    pub overflow: Vec<f64>,
    /// Factor applied to every cell's overflow.
    pub fill: f64,
    /// Scale actually applied to each cell.
    pub final_scales: Vec<f64>,
}

/// Summary of what a reweight did to one row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReweightReport {
    /// Selected cell.
    pub target_cell: usize,
    /// Mass of the target cell before reweighting.
    pub target_mass_before: f64,
    /// Mass of the target cell after reweighting.
    pub target_mass_after: f64,
    /// Fill factor applied to the remaining cells.
    pub fill: f64,
}

impl McReweight {
    /// Create a reweighter with `n >= 1` cells.
    ///
    /// `n` is checked against the vocabulary size on every call, since the
    /// vocabulary is only known from the logits.
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::config("reweight cell count n must be at least 1"));
        }
        Ok(Self { n })
    }

    /// Number of cells.
    pub const fn n(&self) -> usize {
        self.n
    }

    /// Steps 3 to 7 for one row, given per-cell masses `sums`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcmark::reweight::McReweight;
    ///
    /// let scales = McReweight::new(2).unwrap().cell_scales(0, &[0.25, 0.75]);
    /// // Target doubles to 0.5, the other cell shrinks to fill the rest.
    /// assert_eq!(scales.final_scales[0], 2.0);
    /// assert!((scales.final_scales[1] * 0.75 - 0.5).abs() < 1e-12);
    /// ```
    pub fn cell_scales(&self, split_k: usize, sums: &[f64]) -> CellScales {
        let n = self.n as f64;

        let (scales, overflow): (Vec<f64>, Vec<f64>) = sums
            .iter()
            .map(|&s| {
                if s > 0.0 {
                    (n.min(1.0 / s), ((n * s - 1.0) / s).max(0.0))
                } else {
                    (0.0, 0.0)
                }
            })
            .unzip();

        let target_scale = scales[split_k];
        let remain = 1.0 - target_scale * sums[split_k];
        let overflow_total: f64 = overflow.iter().zip(sums).map(|(o, s)| o * s).sum();
        let fill = if overflow_total > 0.0 {
            remain / overflow_total
        } else {
            0.0
        };

        let final_scales = overflow
            .iter()
            .enumerate()
            .map(|(j, &o)| if j == split_k { target_scale } else { fill * o })
            .collect();

        CellScales {
            scales,
            overflow,
            fill,
            final_scales,
        }
    }

    /// Reweight one context's logits with its code.
    pub fn reweight_row(&self, code: &WatermarkCode, logits: &[f32]) -> Result<Vec<f32>> {
        self.check_row(0, code, logits)?;
        let partition = Partition::new(code.vocab_size(), self.n)?;
        Ok(self.apply_with_partition(&partition, code, logits).0)
    }

    /// Like [`reweight_row`](Self::reweight_row), also reporting how much
    /// mass moved into the target cell.
    pub fn reweight_row_with_report(
        &self,
        code: &WatermarkCode,
        logits: &[f32],
    ) -> Result<(Vec<f32>, ReweightReport)> {
        self.check_row(0, code, logits)?;
        let partition = Partition::new(code.vocab_size(), self.n)?;
        Ok(self.apply_with_partition(&partition, code, logits))
    }

    /// Reweight when `config.enabled`, otherwise return the logits as-is.
    pub fn apply_if_enabled(
        &self,
        config: &WatermarkConfig,
        code: &CodeBatch,
        logits: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>> {
        if config.enabled {
            self.reweight_logits(code, logits)
        } else {
            Ok(logits.to_vec())
        }
    }

    fn check_row(&self, row: usize, code: &WatermarkCode, logits: &[f32]) -> Result<()> {
        let vocab_size = code.vocab_size();
        if logits.len() != vocab_size {
            return Err(Error::VocabSizeMismatch {
                row,
                expected: vocab_size,
                actual: logits.len(),
            });
        }
        check_split_count(vocab_size, self.n)?;
        if code.split_k() >= self.n {
            return Err(Error::SplitIndexOutOfRange {
                row,
                split_k: code.split_k(),
                split_count: self.n,
            });
        }
        check_logits(row, logits)
    }

    /// Reweight a validated row.
    fn apply_with_partition(
        &self,
        partition: &Partition,
        code: &WatermarkCode,
        logits: &[f32],
    ) -> (Vec<f32>, ReweightReport) {
        let k = code.split_k();
        let probs = softmax(&code.permute(logits));
        let sums = partition.cell_sums(&probs);
        let scales = self.cell_scales(k, &sums);

        let mut reweighted = vec![0.0f32; probs.len()];
        for (j, cell) in partition.cells().enumerate() {
            let scale = scales.final_scales[j];
            for pos in cell {
                let p = (probs[pos] * scale).max(0.0);
                reweighted[pos] = p.ln() as f32;
            }
        }

        let report = ReweightReport {
            target_cell: k,
            target_mass_before: sums[k],
            target_mass_after: sums[k] * scales.final_scales[k],
            fill: scales.fill,
        };
        trace!(?report, "reweighted row");

        (code.unpermute(&reweighted), report)
    }
}

impl Reweight for McReweight {
    fn reweight_logits(&self, code: &CodeBatch, logits: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        if code.len() != logits.len() {
            return Err(Error::BatchSizeMismatch {
                what: "logits",
                expected: code.len(),
                actual: logits.len(),
            });
        }
        for (row, (c, l)) in code.iter().zip(logits).enumerate() {
            self.check_row(row, c, l)?;
        }

        let Some(first) = code.get(0) else {
            return Ok(Vec::new());
        };
        let partition = Partition::new(first.vocab_size(), self.n)?;

        debug!(
            n = self.n,
            batch_size = logits.len(),
            vocab_size = first.vocab_size(),
            "reweighting logits"
        );

        Ok(code
            .iter()
            .zip(logits)
            .map(|(c, l)| self.apply_with_partition(&partition, c, l).0)
            .collect())
    }
}

impl fmt::Display for McReweight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "McReweight(n={})", self.n)
    }
}
