//! The aggregation engine.
//!
//! Runs the full pipeline for one viewport: sample, score, shape, merge.
//! Each run gets a generation token; when a newer run starts, the older
//! one is abandoned and its results are never published. Finished runs
//! are published as immutable snapshots through a `watch` channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, FixedOffset, Offset as _, Timelike as _, Utc};
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use safezone_area_models::{AlertLevel, Area, BoundingBox, LatLng};
use safezone_scoring::adapter::ScoringAdapter;
use safezone_scoring::progress::ProgressCallback;
use safezone_scoring::{AreaScorer, GenerationGuard, ScoringError};
use serde::Serialize;
use tokio::sync::watch;

use crate::AggregationError;
use crate::config::EngineConfig;
use crate::merger::merge_cells;
use crate::sampler::{AreaClassifier, HashClassifier, ViewportSampler};
use crate::shaper::shape_cells;

/// Per-request inputs to [`AreaAggregationEngine::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateContext {
    /// Map zoom level.
    pub zoom: f64,
    /// Location that sampling prioritizes. Defaults to the viewport center.
    pub reference: Option<LatLng>,
    /// Cell budget. Defaults to `sampler.default_max_cells`.
    pub max_cells: Option<usize>,
    /// Instant of the request. Stamps `last_updated`.
    pub now: DateTime<Utc>,
    /// Offset of the viewport's local time from UTC. Hour-of-day scoring
    /// reads [`Self::now`] in this offset. Defaults to UTC.
    pub utc_offset: FixedOffset,
}

impl GenerateContext {
    /// A context for `zoom` at the current time.
    #[must_use]
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            reference: None,
            max_cells: None,
            now: Utc::now(),
            utc_offset: Utc.fix(),
        }
    }

    /// Sets the reference location.
    #[must_use]
    pub const fn with_reference(mut self, reference: LatLng) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Sets the cell budget.
    #[must_use]
    pub const fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = Some(max_cells);
        self
    }

    /// Pins the request time.
    #[must_use]
    pub const fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Sets the local time offset of the viewport.
    #[must_use]
    pub const fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    /// Local hour of the request, `0..24`.
    #[must_use]
    pub fn local_hour(&self) -> u32 {
        self.now.with_timezone(&self.utc_offset).hour()
    }
}

/// The published result of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSnapshot {
    /// Generation token of the run. Zero for the initial empty snapshot.
    pub generation: u64,
    /// When the run was requested.
    pub generated_at: DateTime<Utc>,
    /// Final areas, merged regions and unmerged cells.
    pub areas: Vec<Area>,
}

/// Aggregate statistics over a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotSummary {
    pub generation: u64,
    pub areas: usize,
    pub merged: usize,
    pub safe: usize,
    pub caution: usize,
    pub warning: usize,
    pub danger: usize,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub mean_score: Option<f64>,
}

impl AreaSnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            generated_at: DateTime::<Utc>::default(),
            areas: Vec::new(),
        }
    }

    /// Counts per alert level and score statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> SnapshotSummary {
        let count = |level: AlertLevel| {
            self.areas
                .iter()
                .filter(|a| a.alert_level() == level)
                .count()
        };
        let scores = self.areas.iter().map(|a| a.safety_score);
        let mean = (!self.areas.is_empty())
            .then(|| scores.clone().sum::<f64>() / self.areas.len() as f64);

        SnapshotSummary {
            generation: self.generation,
            areas: self.areas.len(),
            merged: self.areas.iter().filter(|a| a.is_merged()).count(),
            safe: count(AlertLevel::Safe),
            caution: count(AlertLevel::Caution),
            warning: count(AlertLevel::Warning),
            danger: count(AlertLevel::Danger),
            min_score: scores.clone().reduce(f64::min),
            max_score: scores.reduce(f64::max),
            mean_score: mean,
        }
    }
}

/// Turns viewports into scored, shaped and merged areas.
pub struct AreaAggregationEngine {
    config: EngineConfig,
    adapter: ScoringAdapter,
    classifier: Arc<dyn AreaClassifier>,
    generation: Arc<AtomicU64>,
    snapshots: watch::Sender<Arc<AreaSnapshot>>,
}

impl AreaAggregationEngine {
    /// Creates an engine scoring through `scorer`.
    ///
    /// # Errors
    ///
    /// Returns [`AggregationError::Config`] if `config` fails validation.
    pub fn new(scorer: Arc<dyn AreaScorer>, config: EngineConfig) -> Result<Self, AggregationError> {
        config.validate()?;
        let adapter = ScoringAdapter::new(scorer, config.scoring.clone());
        let (snapshots, _) = watch::channel(Arc::new(AreaSnapshot::empty()));

        Ok(Self {
            config,
            adapter,
            classifier: Arc::new(HashClassifier),
            generation: Arc::new(AtomicU64::new(0)),
            snapshots,
        })
    }

    /// Replaces the area type classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn AreaClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Reports scoring progress to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.adapter = self.adapter.with_progress(progress);
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The most recently published snapshot.
    #[must_use]
    pub fn latest(&self) -> Arc<AreaSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Subscribes to published snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<AreaSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Runs the pipeline for `bounds` and publishes the result.
    ///
    /// Starting a run supersedes every run still in progress.
    ///
    /// # Errors
    ///
    /// * [`AggregationError::Sampler`] for malformed bounds, zoom or
    ///   reference location.
    /// * [`AggregationError::Superseded`] if a newer run started before
    ///   this one finished.
    pub async fn generate(
        &self,
        bounds: BoundingBox,
        ctx: GenerateContext,
    ) -> Result<Arc<AreaSnapshot>, AggregationError> {
        let max_cells = ctx
            .max_cells
            .unwrap_or(self.config.sampler.default_max_cells);
        let sampler = ViewportSampler::new(bounds, ctx.zoom, ctx.reference, max_cells)?;

        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = GenerationGuard::new(Arc::clone(&self.generation), token);

        let mut rng = StdRng::seed_from_u64(self.config.engine.seed);
        let points = sampler.sample(&self.config.sampler, self.classifier.as_ref(), &mut rng);
        let sampled = points.len();

        let scored = self
            .adapter
            .score_points(points, ctx.local_hour(), &guard)
            .await
            .map_err(|e| match e {
                ScoringError::Superseded { generation } => {
                    AggregationError::Superseded { generation }
                }
                other => AggregationError::Scoring(other),
            })
            .inspect_err(|e| log::info!("{e}"))?;

        let grid_size = self.config.sampler.grid_size(ctx.zoom);
        let cells = shape_cells(&scored, grid_size, &self.config.shaper, ctx.now);
        let areas = merge_cells(cells, &self.config.merger, ctx.now);

        if !guard.is_current() {
            log::info!("Generation {token} superseded before publishing");
            return Err(AggregationError::Superseded { generation: token });
        }

        let snapshot = Arc::new(AreaSnapshot {
            generation: token,
            generated_at: ctx.now,
            areas,
        });

        log::info!(
            "Generation {token}: {sampled} cells -> {} areas ({} merged)",
            snapshot.areas.len(),
            snapshot.areas.iter().filter(|a| a.is_merged()).count()
        );

        self.snapshots.send_if_modified(|current| {
            if current.generation < token {
                *current = Arc::clone(&snapshot);
                true
            } else {
                false
            }
        });

        Ok(snapshot)
    }
}
