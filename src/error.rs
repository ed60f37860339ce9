//! Error types for watermark code construction and reweighting.
//!
//! Every error at this layer is a caller contract violation that is detected
//! before any computation runs, so no partially built code or partially
//! reweighted batch is ever observable. Numerical degeneracies (empty or
//! saturated cells, underflow to zero probability) are *not* errors; they
//! produce `0` probability, i.e. a `-∞` logit.
//!
//! # Examples
//!
//! ```rust
//! use mcmark::{Error, Result};
//!
//! fn check_split(split_count: usize, vocab_size: usize) -> Result<()> {
//!     if split_count == 0 || split_count > vocab_size {
//!         return Err(Error::InvalidSplitCount {
//!             split_count,
//!             vocab_size,
//!         });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_split(4, 2).is_err());
//! ```

/// Main error type for the crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Partition count outside `[1, vocab_size]`.
    #[error("split_count must be in [1, vocab_size]: got split_count={split_count}, vocab_size={vocab_size}")]
    InvalidSplitCount {
        /// Requested partition count.
        split_count: usize,
        /// Vocabulary size it was checked against.
        vocab_size: usize,
    },

    /// Vocabulary must contain at least one symbol.
    #[error("vocab_size must be at least 1")]
    InvalidVocabSize,

    /// Two batch-aligned inputs disagree on the number of rows.
    #[error("{what}: expected batch size {expected}, got {actual}")]
    BatchSizeMismatch {
        /// Which argument had the wrong length.
        what: &'static str,
        /// Intended batch size.
        expected: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// A logits row does not match the code's vocabulary size.
    #[error("row {row}: expected vocab size {expected}, got {actual}")]
    VocabSizeMismatch {
        /// Offending batch row.
        row: usize,
        /// Vocabulary size of the watermark code.
        expected: usize,
        /// Length of the logits row.
        actual: usize,
    },

    /// A code's selected cell does not exist under the reweighter's partition.
    #[error("row {row}: split_k={split_k} is out of range for split_count={split_count}")]
    SplitIndexOutOfRange {
        /// Offending batch row.
        row: usize,
        /// Selected cell.
        split_k: usize,
        /// Partition count of the reweighter.
        split_count: usize,
    },

    /// A supplied shuffle is not a permutation of `0..vocab_size`.
    #[error("invalid permutation: {0}")]
    InvalidPermutation(String),

    /// Logits that cannot describe a distribution (`NaN`, `+∞`, all `-∞`).
    #[error("row {row}: invalid logits: {reason}")]
    InvalidLogits {
        /// Offending batch row.
        row: usize,
        /// What was wrong with the row.
        reason: &'static str,
    },

    /// Configuration could not be parsed or is inconsistent.
    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a config error.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcmark::Error;
    ///
    /// let err = Error::config("missing vocab_size");
    /// assert!(matches!(err, Error::Config(_)));
    /// ```
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid permutation error.
    pub fn invalid_permutation(msg: impl Into<String>) -> Self {
        Self::InvalidPermutation(msg.into())
    }

    /// Whether the error comes from construction-time parameters rather
    /// than from the per-call logits.
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSplitCount { .. }
                | Self::InvalidVocabSize
                | Self::InvalidPermutation(_)
                | Self::Config(_)
        )
    }

    /// Get error code for logging.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcmark::Error;
    ///
    /// let err = Error::InvalidVocabSize;
    /// assert_eq!(err.code(), "INVALID_VOCAB_SIZE");
    /// ```
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidSplitCount { .. } => "INVALID_SPLIT_COUNT",
            Self::InvalidVocabSize => "INVALID_VOCAB_SIZE",
            Self::BatchSizeMismatch { .. } => "BATCH_SIZE_MISMATCH",
            Self::VocabSizeMismatch { .. } => "VOCAB_SIZE_MISMATCH",
            Self::SplitIndexOutOfRange { .. } => "SPLIT_INDEX_OUT_OF_RANGE",
            Self::InvalidPermutation(_) => "INVALID_PERMUTATION",
            Self::InvalidLogits { .. } => "INVALID_LOGITS",
            Self::Config(_) => "CONFIG",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Check `1 <= split_count <= vocab_size`.
pub(crate) fn check_split_count(vocab_size: usize, split_count: usize) -> Result<()> {
    if vocab_size == 0 {
        return Err(Error::InvalidVocabSize);
    }
    if split_count == 0 || split_count > vocab_size {
        return Err(Error::InvalidSplitCount {
            split_count,
            vocab_size,
        });
    }
    Ok(())
}
