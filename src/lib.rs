//! MCMark Watermark Reweighting
//!
//! Embeds a statistically detectable watermark into a language model's
//! next-token distribution without changing what the distribution is on
//! average over watermark codes.
//!
//! # Overview
//!
//! Two pieces, used leaf-first:
//!
//! - **Code**: [`WatermarkCode`], a private vocabulary permutation plus a
//!   selected partition cell, drawn once per generation context from an
//!   injected random source.
//! - **Reweight**: [`McReweight`], a stateless transform that moves
//!   probability mass toward the selected cell of an `n`-way partition of
//!   the permuted vocabulary, returning new logits of the same shape.
//!
//! The decoding loop obtains logits from the model, reweights them with the
//! context's code, and samples as usual. All per-context state lives in the
//! code; the reweighter keeps nothing between calls.
//!
//! # Examples
//!
//! ```rust
//! use mcmark::config::WatermarkConfig;
//! use mcmark::distribution::is_valid_distribution;
//! use mcmark::reweight::Reweight;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let config = WatermarkConfig::new(8, 4);
//! let reweighter = config.reweighter().unwrap();
//!
//! let mut rngs = vec![ChaCha8Rng::seed_from_u64(11)];
//! let codes = config.build_batch(&mut rngs, 1).unwrap();
//!
//! let logits = vec![vec![0.5, -1.0, 2.0, 0.0, 1.5, -0.5, 0.3, 0.9]];
//! let watermarked = reweighter.reweight_logits(&codes, &logits).unwrap();
//! assert!(is_valid_distribution(&watermarked[0], 1e-5));
//! ```
//!
//! # Quality Standards
//!
//! - Property-based tests for mass conservation, permutation inversion and
//!   partition coverage
//! - Benchmarks for the per-step transform

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]
#![allow(clippy::return_self_not_must_use)]

pub mod code;
pub mod config;
pub mod distribution;
pub mod error;
pub mod partition;
pub mod reweight;

pub use code::{CodeBatch, WatermarkCode};
pub use config::WatermarkConfig;
pub use error::{Error, Result};
pub use reweight::{McReweight, Reweight};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
