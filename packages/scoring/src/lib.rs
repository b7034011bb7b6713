#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safety scoring for sample points.
//!
//! The real scoring service is an external collaborator behind the
//! [`AreaScorer`] trait; it may fail, time out, or rate-limit us. The
//! [`adapter::ScoringAdapter`] wraps it so that a scoring failure never
//! aborts a generation run:
//!
//! 1. Only high-priority points are sent to the real scorer; everything
//!    else is scored by the deterministic [`fallback`] function.
//! 2. Real-scorer calls run with bounded concurrency behind a
//!    [`rate_limit::TokenBucket`].
//! 3. Any error, timeout, or out-of-range payload degrades that single
//!    point to the fallback score.
//!
//! Runs that have been superseded by a newer generation stop issuing
//! calls and report [`ScoringError::Superseded`].

pub mod adapter;
pub mod fallback;
pub mod http;
pub mod progress;
pub mod rate_limit;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use safezone_area_models::{AreaType, LatLng, SamplePoint, ScoreResult, ScoreValidationError};
use thiserror::Error;

/// Errors from scoring operations.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// HTTP request to the scoring service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The scoring service returned a non-success status.
    #[error("Scoring service returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The scoring service asked us to slow down.
    #[error("Scoring service rate limit exceeded")]
    RateLimited,

    /// The call did not finish within the configured timeout.
    #[error("Scoring call timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The payload was missing fields or had out-of-range values.
    #[error("Invalid score payload: {0}")]
    InvalidPayload(#[from] ScoreValidationError),

    /// A newer generation started while this one was scoring.
    #[error("Generation {generation} was superseded")]
    Superseded {
        /// The abandoned generation token.
        generation: u64,
    },
}

/// Per-call options passed to the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreOptions {
    /// Land-use classification of the point.
    pub area_type: AreaType,
    /// Local hour of day, 0–23.
    pub hour_of_day: u32,
}

/// The external scoring collaborator.
#[async_trait::async_trait]
pub trait AreaScorer: Send + Sync {
    /// Scores a single location.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError`] if the assessment could not be produced.
    async fn score(
        &self,
        position: LatLng,
        options: &ScoreOptions,
    ) -> Result<ScoreResult, ScoringError>;
}

/// Where a point's score came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    /// The external scorer produced a validated result.
    Scorer,
    /// The deterministic fallback was used.
    Fallback,
}

/// A sample point together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// The sampled location.
    pub point: SamplePoint,
    /// Safety score, 0–100. Always present.
    pub safety_score: f64,
    /// Full assessment; `None` when the fallback was used.
    pub score_result: Option<ScoreResult>,
    /// Where the score came from.
    pub source: ScoreSource,
}

impl ScoredPoint {
    /// Wraps a validated scorer result.
    #[must_use]
    pub fn from_scorer(point: SamplePoint, result: ScoreResult) -> Self {
        Self {
            point,
            safety_score: result.overall_score,
            score_result: Some(result),
            source: ScoreSource::Scorer,
        }
    }

    /// Scores a point with the deterministic fallback.
    #[must_use]
    pub fn from_fallback(point: SamplePoint, hour_of_day: u32) -> Self {
        let safety_score = fallback::fallback_score(point.position, point.area_type, hour_of_day);
        Self {
            point,
            safety_score,
            score_result: None,
            source: ScoreSource::Fallback,
        }
    }
}

/// Identifies one generation run and detects when it has been superseded.
///
/// The engine hands out tokens from a shared monotonically increasing
/// counter; a guard is current only while no newer token has been issued.
#[derive(Debug, Clone)]
pub struct GenerationGuard {
    latest: Arc<AtomicU64>,
    token: u64,
}

impl GenerationGuard {
    /// Creates a guard for `token` watching the shared `latest` counter.
    #[must_use]
    pub const fn new(latest: Arc<AtomicU64>, token: u64) -> Self {
        Self { latest, token }
    }

    /// A guard that is never superseded.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)), 0)
    }

    /// This run's token.
    #[must_use]
    pub const fn token(&self) -> u64 {
        self.token
    }

    /// Returns `true` while no newer generation has started.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.token
    }

    /// Fails with [`ScoringError::Superseded`] if a newer generation started.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Superseded`] when the guard is stale.
    pub fn ensure_current(&self) -> Result<(), ScoringError> {
        if self.is_current() {
            Ok(())
        } else {
            Err(ScoringError::Superseded {
                generation: self.token,
            })
        }
    }
}
