//! Watermark configuration.
//!
//! A [`WatermarkConfig`] fixes the vocabulary size and partition count shared
//! by every context that uses it. It is plain data: serializable with serde,
//! buildable with a builder, and validated before anything is constructed
//! from it.
//!
//! # Examples
//!
//! ```rust
//! use mcmark::config::WatermarkConfig;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let config = WatermarkConfig::builder()
//!     .vocab_size(1000)
//!     .split_count(8)
//!     .build()
//!     .unwrap();
//!
//! let reweighter = config.reweighter().unwrap();
//! let code = config.build_code(&mut ChaCha8Rng::seed_from_u64(0)).unwrap();
//! assert_eq!(reweighter.n(), 8);
//! assert_eq!(code.vocab_size(), 1000);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::code::{CodeBatch, WatermarkCode};
use crate::error::check_split_count;
use crate::reweight::McReweight;
use crate::Result;

/// Default vocabulary size.
pub const DEFAULT_VOCAB_SIZE: usize = 32000;

/// Default partition count.
pub const DEFAULT_SPLIT_COUNT: usize = 20;

/// Configuration for watermark reweighting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatermarkConfig {
    /// Vocabulary size shared by model and code.
    pub vocab_size: usize,

    /// Partition count `n`, in `[1, vocab_size]`.
    pub split_count: usize,

    /// Whether reweighting is applied at all.
    pub enabled: bool,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            vocab_size: DEFAULT_VOCAB_SIZE,
            split_count: DEFAULT_SPLIT_COUNT,
            enabled: true,
        }
    }
}

impl WatermarkConfig {
    /// Enabled config with the given sizes. Not validated.
    pub const fn new(vocab_size: usize, split_count: usize) -> Self {
        Self {
            vocab_size,
            split_count,
            enabled: true,
        }
    }

    /// Create a new builder.
    pub fn builder() -> WatermarkConfigBuilder {
        WatermarkConfigBuilder::default()
    }

    /// Two cells: strongest bias per step, coarsest control.
    pub fn coarse() -> Self {
        Self {
            split_count: 2,
            ..Default::default()
        }
    }

    /// One cell per token.
    pub const fn per_token(vocab_size: usize) -> Self {
        Self::new(vocab_size, vocab_size)
    }

    /// Check `vocab_size >= 1` and `1 <= split_count <= vocab_size`.
    pub fn validate(&self) -> Result<()> {
        check_split_count(self.vocab_size, self.split_count)
    }

    /// Parse and validate a JSON config.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use mcmark::config::WatermarkConfig;
    ///
    /// let config = WatermarkConfig::from_json(r#"{"vocab_size": 50, "split_count": 5}"#).unwrap();
    /// assert_eq!(config.split_count, 5);
    /// assert!(config.enabled);
    ///
    /// assert!(WatermarkConfig::from_json(r#"{"vocab_size": 4, "split_count": 5}"#).is_err());
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reweighter for this config.
    pub fn reweighter(&self) -> Result<McReweight> {
        self.validate()?;
        McReweight::new(self.split_count)
    }

    /// Draw one context's code.
    pub fn build_code<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<WatermarkCode> {
        WatermarkCode::from_random(rng, self.vocab_size, self.split_count)
    }

    /// Draw one code per source for a batch of `batch_size` rows.
    pub fn build_batch<R: Rng>(&self, rngs: &mut [R], batch_size: usize) -> Result<CodeBatch> {
        CodeBatch::from_rngs(rngs, batch_size, self.vocab_size, self.split_count)
    }
}

/// Builder for `WatermarkConfig`.
#[derive(Debug, Default)]
pub struct WatermarkConfigBuilder {
    vocab_size: Option<usize>,
    split_count: Option<usize>,
    enabled: Option<bool>,
}

impl WatermarkConfigBuilder {
    /// Set vocabulary size.
    pub const fn vocab_size(mut self, value: usize) -> Self {
        self.vocab_size = Some(value);
        self
    }

    /// Set partition count.
    pub const fn split_count(mut self, value: usize) -> Self {
        self.split_count = Some(value);
        self
    }

    /// Set whether reweighting is enabled.
    pub const fn enabled(mut self, value: bool) -> Self {
        self.enabled = Some(value);
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<WatermarkConfig> {
        let default = WatermarkConfig::default();
        let config = WatermarkConfig {
            vocab_size: self.vocab_size.unwrap_or(default.vocab_size),
            split_count: self.split_count.unwrap_or(default.split_count),
            enabled: self.enabled.unwrap_or(default.enabled),
        };
        config.validate()?;
        Ok(config)
    }
}
