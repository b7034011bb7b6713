//! Viewport sampling.
//!
//! Turns a bounding box and zoom level into a prioritized, capped list of
//! [`SamplePoint`]s. The grid gets finer as the map zooms in; each
//! candidate is jittered by a seeded RNG so runs are reproducible.

use rand::Rng;
use safezone_area_models::{
    AreaType, BoundingBox, CoordinateError, LatLng, SamplePoint, coordinate_hash,
};
use serde::Deserialize;
use thiserror::Error;

/// Hash salt for area type classification.
const AREA_TYPE_SALT: u64 = 0xA4EA_7193;

/// Lowest accepted zoom level.
pub const MIN_ZOOM: f64 = 0.0;

/// Highest accepted zoom level. Beyond this the grid shrinks toward the
/// resolution of `f64` coordinates and cell outlines collapse.
pub const MAX_ZOOM: f64 = 30.0;

/// Errors raised while constructing a sampler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    /// A corner or the reference location is malformed.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    /// Zoom level is not finite or lies outside [`MIN_ZOOM`]..=[`MAX_ZOOM`].
    #[error("invalid zoom level {value} (expected {MIN_ZOOM} to {MAX_ZOOM})")]
    Zoom {
        /// The offending value.
        value: f64,
    },
}

/// Grid and priority parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Grid cell size at or below `zoom_threshold`, in degrees.
    pub base_grid_size_deg: f64,
    /// Zoom level above which the grid starts shrinking.
    pub zoom_threshold: f64,
    /// Shrink factor per zoom level above the threshold.
    pub zoom_factor: f64,
    /// Maximum jitter as a fraction of the grid size.
    pub jitter_fraction: f64,
    /// Upper bound on grid steps along either axis.
    pub max_steps_per_axis: u32,
    /// Cell budget used when a request does not specify one.
    pub default_max_cells: usize,
    /// Distance from the reference at which priority bottoms out.
    pub priority_falloff_deg: f64,
    /// Priority floor.
    pub min_priority: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            base_grid_size_deg: 0.01,
            zoom_threshold: 13.0,
            zoom_factor: 1.5,
            jitter_fraction: 0.1,
            max_steps_per_axis: 24,
            default_max_cells: 12,
            priority_falloff_deg: 0.05,
            min_priority: 0.1,
        }
    }
}

impl SamplerConfig {
    /// Grid cell size for a zoom level: `base / factor^max(0, zoom - threshold)`.
    #[must_use]
    pub fn grid_size(&self, zoom: f64) -> f64 {
        self.base_grid_size_deg / self.zoom_factor.powf((zoom - self.zoom_threshold).max(0.0))
    }
}

/// Assigns a land-use type to a location.
pub trait AreaClassifier: Send + Sync {
    /// Classifies `position`.
    fn classify(&self, position: LatLng) -> AreaType;
}

/// Default classifier: a deterministic hash of the coordinates.
#[derive(Debug, Default, Clone, Copy)]
pub struct HashClassifier;

impl AreaClassifier for HashClassifier {
    fn classify(&self, position: LatLng) -> AreaType {
        AreaType::from_hash(coordinate_hash(position, AREA_TYPE_SALT))
    }
}

/// Every location gets the same type.
impl AreaClassifier for AreaType {
    fn classify(&self, _position: LatLng) -> AreaType {
        *self
    }
}

/// A validated sampling request.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportSampler {
    bounds: BoundingBox,
    zoom: f64,
    reference: LatLng,
    max_cells: usize,
}

impl ViewportSampler {
    /// Validates the request.
    ///
    /// When `reference` is `None` the center of `bounds` is used.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError`] for malformed corners, reference, or zoom.
    pub fn new(
        bounds: BoundingBox,
        zoom: f64,
        reference: Option<LatLng>,
        max_cells: usize,
    ) -> Result<Self, SamplerError> {
        let bounds = bounds.validate()?;
        if !(MIN_ZOOM..=MAX_ZOOM).contains(&zoom) {
            return Err(SamplerError::Zoom { value: zoom });
        }
        let reference = match reference {
            Some(r) => r.validate()?,
            None => bounds.center(),
        };

        Ok(Self {
            bounds,
            zoom,
            reference,
            max_cells,
        })
    }

    /// The requested zoom level.
    #[must_use]
    pub const fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Priority of a location: closer to the reference is higher.
    #[must_use]
    pub fn priority(&self, position: LatLng, config: &SamplerConfig) -> f64 {
        let distance = position.planar_distance(self.reference);
        (1.0 - distance / config.priority_falloff_deg).clamp(config.min_priority, 1.0)
    }

    /// Produces at most `max_cells` sample points, highest priority first.
    ///
    /// Returns an empty list for a zero-width or zero-height box.
    #[must_use]
    pub fn sample<R: Rng>(
        &self,
        config: &SamplerConfig,
        classifier: &dyn AreaClassifier,
        rng: &mut R,
    ) -> Vec<SamplePoint> {
        if self.bounds.is_degenerate() || self.max_cells == 0 {
            log::debug!("Degenerate viewport or zero cell budget; nothing to sample");
            return Vec::new();
        }

        let size = config.grid_size(self.zoom);
        let lat_steps = axis_steps(self.bounds.height(), size, config.max_steps_per_axis);
        let lng_steps = axis_steps(self.bounds.width(), size, config.max_steps_per_axis);
        let lat_step = self.bounds.height() / f64::from(lat_steps);
        let lng_step = self.bounds.width() / f64::from(lng_steps);
        let jitter = config.jitter_fraction.abs() * size;

        log::debug!(
            "Sampling {lat_steps}x{lng_steps} grid (size {size:.6} deg at zoom {})",
            self.zoom
        );

        let sw = self.bounds.south_west;
        let mut points = Vec::with_capacity((lat_steps * lng_steps) as usize);

        for i in 0..lat_steps {
            for j in 0..lng_steps {
                let center = LatLng::new(
                    (f64::from(i) + 0.5).mul_add(lat_step, sw.lat),
                    (f64::from(j) + 0.5).mul_add(lng_step, sw.lng),
                );
                let jittered = LatLng::new(
                    center.lat + rng.random_range(-jitter..=jitter),
                    center.lng + rng.random_range(-jitter..=jitter),
                );
                let position = self.bounds.clamp(jittered);

                points.push(SamplePoint {
                    id: format!("cell-{i}-{j}"),
                    position,
                    area_type: classifier.classify(position),
                    priority: self.priority(position, config),
                });
            }
        }

        points.sort_by(|a, b| b.priority.total_cmp(&a.priority));
        if points.len() > self.max_cells {
            log::debug!(
                "Truncating {} candidates to {} cells",
                points.len(),
                self.max_cells
            );
            points.truncate(self.max_cells);
        }

        points
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn axis_steps(span: f64, size: f64, max_steps: u32) -> u32 {
    ((span / size).ceil() as u32).clamp(1, max_steps.max(1))
}
