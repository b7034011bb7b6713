#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safety area aggregation.
//!
//! Turns a map viewport into a small set of scored, shaped and merged
//! safety areas:
//!
//! 1. [`sampler`] lays a zoom-dependent grid over the viewport and keeps
//!    the highest-priority sample points.
//! 2. The scoring adapter from `safezone_scoring` scores each point,
//!    degrading to a deterministic fallback on any failure.
//! 3. [`shaper`] builds a polygon around every scored point.
//! 4. [`merger`] coalesces compatible neighboring cells and [`combine`]
//!    folds each group into one area with a convex hull boundary.
//!
//! [`engine::AreaAggregationEngine`] runs the pipeline and publishes each
//! finished run as an immutable snapshot; [`trigger::run_debounced`] drives
//! it from a stream of viewport changes.

pub mod combine;
pub mod config;
pub mod engine;
pub mod export;
pub mod merger;
pub mod sampler;
pub mod shaper;
pub mod trigger;

use safezone_scoring::ScoringError;
use thiserror::Error;

pub use config::{ConfigError, EngineConfig};
pub use engine::{AreaAggregationEngine, AreaSnapshot, GenerateContext, SnapshotSummary};
pub use sampler::{AreaClassifier, HashClassifier, SamplerError, ViewportSampler};
pub use trigger::{ViewportChange, run_debounced};

/// Errors from an aggregation run.
#[derive(Debug, Error)]
pub enum AggregationError {
    /// The request was malformed.
    #[error(transparent)]
    Sampler(#[from] SamplerError),

    /// A newer run started before this one finished.
    #[error("Generation {generation} was superseded")]
    Superseded {
        /// The abandoned generation token.
        generation: u64,
    },

    /// Scoring failed in a way the adapter could not absorb.
    #[error(transparent)]
    Scoring(ScoringError),

    /// The engine configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
