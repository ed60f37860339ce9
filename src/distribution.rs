//! Probability helpers shared by the reweighting transform.
//!
//! Logits arrive as `f32` from the model. Everything that sums over the
//! vocabulary is done in `f64` so that mass conservation holds well inside
//! `1e-5` even for large vocabularies.
//!
//! # Key Concepts
//!
//! ## Stable softmax
//!
//! The row maximum is subtracted before exponentiation, so logits in the
//! thousands do not overflow. `-∞` logits map to exactly `0.0`.
//!
//! ## Excluded tokens
//!
//! A token whose probability is exactly `0` is represented by a `-∞` logit.
//! That is the intended encoding, not an error.

use crate::{Error, Result};

/// Compute softmax of logits in `f64`.
///
/// Falls back to a uniform distribution if the row carries no finite mass;
/// callers that need to reject such rows use [`check_logits`] first.
///
/// # Examples
///
/// ```rust
/// use mcmark::distribution::softmax;
///
/// let probs = softmax(&[0.0, 0.0, f32::NEG_INFINITY]);
/// assert!((probs[0] - 0.5).abs() < 1e-12);
/// assert_eq!(probs[2], 0.0);
/// ```
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits
        .iter()
        .map(|&x| f64::from(x))
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        return vec![1.0 / logits.len() as f64; logits.len()];
    }

    let exp: Vec<f64> = logits.iter().map(|&x| (f64::from(x) - max).exp()).collect();
    let sum: f64 = exp.iter().sum();

    exp.iter().map(|e| e / sum).collect()
}

/// Compute log softmax of logits.
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    if logits.is_empty() {
        return Vec::new();
    }

    let max = logits
        .iter()
        .map(|&x| f64::from(x))
        .fold(f64::NEG_INFINITY, f64::max);
    let sum_exp: f64 = logits.iter().map(|&x| (f64::from(x) - max).exp()).sum();
    let log_sum_exp = max + sum_exp.ln();

    logits
        .iter()
        .map(|&x| (f64::from(x) - log_sum_exp) as f32)
        .collect()
}

/// Total probability mass `Σ exp(logit)` of an already-normalized row.
pub fn total_mass(logits: &[f32]) -> f64 {
    logits.iter().map(|&x| f64::from(x).exp()).sum()
}

/// Whether a row of log-probabilities describes a valid distribution:
/// no `NaN`, every probability non-negative, and unit mass within `tol`.
///
/// # Examples
///
/// ```rust
/// use mcmark::distribution::is_valid_distribution;
///
/// let half = 0.5f32.ln();
/// assert!(is_valid_distribution(&[half, half, f32::NEG_INFINITY], 1e-6));
/// assert!(!is_valid_distribution(&[half, f32::NAN], 1e-6));
/// ```
pub fn is_valid_distribution(logits: &[f32], tol: f64) -> bool {
    if logits.iter().any(|x| x.is_nan() || *x == f32::INFINITY) {
        return false;
    }
    (total_mass(logits) - 1.0).abs() <= tol
}

/// Reject logits that cannot be turned into a distribution.
///
/// `-∞` entries are fine as long as at least one entry is finite.
pub fn check_logits(row: usize, logits: &[f32]) -> Result<()> {
    let mut any_finite = false;
    for &x in logits {
        if x.is_nan() {
            return Err(Error::InvalidLogits {
                row,
                reason: "NaN logit",
            });
        }
        if x == f32::INFINITY {
            return Err(Error::InvalidLogits {
                row,
                reason: "+inf logit",
            });
        }
        any_finite |= x.is_finite();
    }
    if !any_finite {
        return Err(Error::InvalidLogits {
            row,
            reason: "no finite logit",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax() {
        let probs = softmax(&[1.0, 2.0, 3.0]);

        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);

        assert!(probs[2] > probs[1]);
        assert!(probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_empty() {
        assert!(softmax(&[]).is_empty());
    }

    #[test]
    fn test_softmax_numerical_stability() {
        let probs = softmax(&[1000.0, 1001.0, 1002.0]);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_softmax_neg_infinity_is_zero() {
        let probs = softmax(&[f32::NEG_INFINITY, 0.0]);
        assert_eq!(probs[0], 0.0);
        assert!((probs[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_all_neg_infinity_uniform() {
        let probs = softmax(&[f32::NEG_INFINITY; 4]);
        assert_eq!(probs, vec![0.25; 4]);
    }

    #[test]
    fn test_log_softmax() {
        let log_probs = log_softmax(&[1.0, 2.0, 3.0]);

        for lp in &log_probs {
            assert!(*lp <= 0.0);
        }
        assert!((total_mass(&log_probs) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_is_valid_distribution() {
        let quarter = 0.25f32.ln();
        assert!(is_valid_distribution(&[quarter; 4], 1e-6));
        assert!(!is_valid_distribution(&[quarter; 3], 1e-6));
        assert!(!is_valid_distribution(&[0.0, f32::INFINITY], 1e-6));
    }

    #[test]
    fn test_check_logits() {
        assert!(check_logits(0, &[0.0, f32::NEG_INFINITY]).is_ok());
        assert_eq!(
            check_logits(3, &[0.0, f32::NAN]),
            Err(Error::InvalidLogits {
                row: 3,
                reason: "NaN logit"
            })
        );
        assert!(check_logits(0, &[f32::INFINITY]).is_err());
        assert!(check_logits(0, &[f32::NEG_INFINITY; 2]).is_err());
    }
}
