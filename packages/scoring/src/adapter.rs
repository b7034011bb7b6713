//! Rate-limited, failure-tolerant wrapper around an [`AreaScorer`].

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt as _};
use safezone_area_models::SamplePoint;
use serde::Deserialize;

use crate::progress::{ProgressCallback, null_progress};
use crate::rate_limit::TokenBucket;
use crate::{AreaScorer, GenerationGuard, ScoreOptions, ScoredPoint, ScoringError};

/// How the adapter talks to the real scorer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Points with `priority` strictly above this go to the real scorer.
    pub priority_threshold: f64,
    /// Maximum number of in-flight scorer calls.
    pub concurrency: usize,
    /// Token bucket size.
    pub bucket_capacity: u32,
    /// Time to refill a full bucket, in milliseconds.
    pub refill_interval_ms: u64,
    /// Per-call timeout, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            priority_threshold: 0.7,
            concurrency: 2,
            bucket_capacity: 2,
            refill_interval_ms: 1000,
            timeout_ms: 5000,
        }
    }
}

/// Wraps the real scorer with priority filtering, bounded concurrency, a
/// token-bucket rate limiter, and per-point fallback.
pub struct ScoringAdapter {
    scorer: Arc<dyn AreaScorer>,
    policy: ScoringPolicy,
    limiter: TokenBucket,
    progress: Arc<dyn ProgressCallback>,
}

impl ScoringAdapter {
    /// Creates an adapter around `scorer`.
    #[must_use]
    pub fn new(scorer: Arc<dyn AreaScorer>, policy: ScoringPolicy) -> Self {
        let limiter = TokenBucket::new(
            policy.bucket_capacity,
            Duration::from_millis(policy.refill_interval_ms),
        );
        Self {
            scorer,
            policy,
            limiter,
            progress: null_progress(),
        }
    }

    /// Reports per-point progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Scores every point, preserving input order.
    ///
    /// Points at or below the priority threshold are scored by the
    /// fallback immediately. The rest are sent to the real scorer; any
    /// failure degrades that point to the fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::Superseded`] if `guard` goes stale before
    /// scoring finishes. No other error escapes.
    pub async fn score_points(
        &self,
        points: Vec<SamplePoint>,
        hour_of_day: u32,
        guard: &GenerationGuard,
    ) -> Result<Vec<ScoredPoint>, ScoringError> {
        self.progress.set_total(points.len() as u64);
        self.progress
            .set_message(format!("Scoring {} points", points.len()));

        let mut slots: Vec<Option<ScoredPoint>> = Vec::with_capacity(points.len());
        let mut remote = Vec::new();

        for (index, point) in points.into_iter().enumerate() {
            if point.priority > self.policy.priority_threshold {
                slots.push(None);
                remote.push((index, point));
            } else {
                slots.push(Some(ScoredPoint::from_fallback(point, hour_of_day)));
                self.progress.inc(1);
            }
        }

        log::debug!(
            "generation {}: {} points to scorer, {} to fallback",
            guard.token(),
            remote.len(),
            slots.len() - remote.len()
        );

        let scored: Vec<(usize, Result<ScoredPoint, ScoringError>)> =
            stream::iter(remote.into_iter().map(|(index, point)| async move {
                (index, self.score_remote(point, hour_of_day, guard).await)
            }))
            .buffered(self.policy.concurrency.max(1))
            .collect()
            .await;

        for (index, result) in scored {
            slots[index] = Some(result?);
        }

        // Results that arrived after a newer run started are discarded.
        guard.ensure_current()?;

        self.progress.finish(format!("Scored {} points", slots.len()));

        Ok(slots.into_iter().flatten().collect())
    }

    async fn score_remote(
        &self,
        point: SamplePoint,
        hour_of_day: u32,
        guard: &GenerationGuard,
    ) -> Result<ScoredPoint, ScoringError> {
        guard.ensure_current()?;
        self.limiter.acquire().await;
        guard.ensure_current()?;

        let options = ScoreOptions {
            area_type: point.area_type,
            hour_of_day,
        };
        let timeout = Duration::from_millis(self.policy.timeout_ms);

        let outcome = match tokio::time::timeout(timeout, self.scorer.score(point.position, &options))
            .await
        {
            Ok(Ok(result)) => result.validate().map_err(ScoringError::from),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ScoringError::Timeout {
                timeout_ms: self.policy.timeout_ms,
            }),
        };

        self.progress.inc(1);

        Ok(match outcome {
            Ok(result) => ScoredPoint::from_scorer(point, result),
            Err(e) => {
                log::warn!("Scoring {} failed, using fallback: {e}", point.id);
                ScoredPoint::from_fallback(point, hour_of_day)
            }
        })
    }
}
