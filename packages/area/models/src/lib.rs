#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Safety area data model.
//!
//! Defines the records that flow through the area aggregation pipeline:
//! viewport [`BoundingBox`]es, [`SamplePoint`]s produced by the sampler,
//! [`ScoreResult`]s produced by the scoring collaborator, and the final
//! [`Area`] records handed to the map-rendering layer. All types are plain
//! data; none of them are mutated after a generation run hands them off.

pub mod style;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use style::AreaStyle;

/// Prefix used for the ids of synthesized (merged) areas.
pub const MERGED_ID_PREFIX: &str = "merged:";

/// Separator between member ids inside a merged area id.
pub const MERGED_ID_SEPARATOR: char = '+';

/// Errors raised when coordinates or bounding boxes are malformed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    /// Latitude is NaN/infinite or outside `[-90, 90]`.
    #[error("invalid latitude {value}: expected a finite value in [-90, 90]")]
    Latitude {
        /// The offending value.
        value: f64,
    },

    /// Longitude is NaN/infinite or outside `[-180, 180]`.
    #[error("invalid longitude {value}: expected a finite value in [-180, 180]")]
    Longitude {
        /// The offending value.
        value: f64,
    },

    /// The north-east corner lies south or west of the south-west corner.
    #[error("bounding box corners are inverted: north-east {north_east} is not above/right of south-west {south_west}")]
    InvertedBounds {
        /// North-east corner as supplied.
        north_east: LatLng,
        /// South-west corner as supplied.
        south_west: LatLng,
    },
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Creates a coordinate without validation.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Checks that both components are finite and within WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] naming the first invalid component.
    pub fn validate(self) -> Result<Self, CoordinateError> {
        if !self.lat.is_finite() || !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::Latitude { value: self.lat });
        }
        if !self.lng.is_finite() || !(-180.0..=180.0).contains(&self.lng) {
            return Err(CoordinateError::Longitude { value: self.lng });
        }
        Ok(self)
    }

    /// Planar distance in degrees, treating lat/lng as a flat plane.
    #[must_use]
    pub fn planar_distance(self, other: Self) -> f64 {
        (self.lat - other.lat).hypot(self.lng - other.lng)
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// A viewport expressed by its north-east and south-west corners.
///
/// Viewports crossing the antimeridian are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    /// North-east (top-right) corner.
    pub north_east: LatLng,
    /// South-west (bottom-left) corner.
    pub south_west: LatLng,
}

impl BoundingBox {
    /// Creates a bounding box without validation.
    #[must_use]
    pub const fn new(north_east: LatLng, south_west: LatLng) -> Self {
        Self {
            north_east,
            south_west,
        }
    }

    /// Validates both corners and their ordering.
    ///
    /// A zero-width or zero-height box is valid here; it is treated as
    /// degenerate (see [`Self::is_degenerate`]) rather than malformed.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] if either corner is out of range or the
    /// corners are inverted.
    pub fn validate(self) -> Result<Self, CoordinateError> {
        self.north_east.validate()?;
        self.south_west.validate()?;

        if self.north_east.lat < self.south_west.lat || self.north_east.lng < self.south_west.lng {
            return Err(CoordinateError::InvertedBounds {
                north_east: self.north_east,
                south_west: self.south_west,
            });
        }

        Ok(self)
    }

    /// Latitude span in degrees.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    /// Longitude span in degrees.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.north_east.lng - self.south_west.lng
    }

    /// Returns `true` if the box has no area.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.height() <= 0.0 || self.width() <= 0.0
    }

    /// Geometric center of the box.
    #[must_use]
    pub fn center(&self) -> LatLng {
        LatLng::new(
            f64::midpoint(self.north_east.lat, self.south_west.lat),
            f64::midpoint(self.north_east.lng, self.south_west.lng),
        )
    }

    /// Clamps a coordinate into the box.
    #[must_use]
    pub fn clamp(&self, point: LatLng) -> LatLng {
        LatLng::new(
            point.lat.clamp(self.south_west.lat, self.north_east.lat),
            point.lng.clamp(self.south_west.lng, self.north_east.lng),
        )
    }

    /// Returns `true` if the coordinate lies inside or on the box edge.
    #[must_use]
    pub fn contains(&self, point: LatLng) -> bool {
        (self.south_west.lat..=self.north_east.lat).contains(&point.lat)
            && (self.south_west.lng..=self.north_east.lng).contains(&point.lng)
    }
}

/// Land-use classification of a sample point.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AreaType {
    /// Housing blocks.
    Residential,
    /// Shops, offices and mixed retail.
    Commercial,
    /// Stations, stops and interchanges.
    Transit,
    /// Parks and open green space.
    Park,
    /// Warehouses, yards and plants.
    Industrial,
    /// Hospitals, police and fire stations.
    Emergency,
}

impl AreaType {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Residential,
            Self::Commercial,
            Self::Transit,
            Self::Park,
            Self::Industrial,
            Self::Emergency,
        ]
    }

    /// Picks a variant from a hash value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_hash(hash: u64) -> Self {
        let all = Self::all();
        all[(hash % all.len() as u64) as usize]
    }
}

/// Ordinal risk classification, `Safe < Caution < Warning < Danger`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertLevel {
    /// No notable risk.
    Safe,
    /// Minor risk; stay aware.
    Caution,
    /// Elevated risk.
    Warning,
    /// High risk; avoid if possible.
    Danger,
}

impl AlertLevel {
    /// Derives an alert level from a 0–100 safety score.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Self::Safe
        } else if score >= 55.0 {
            Self::Caution
        } else if score >= 35.0 {
            Self::Warning
        } else {
            Self::Danger
        }
    }

    /// Returns the most severe of the given levels, or `None` if empty.
    pub fn most_severe(levels: impl IntoIterator<Item = Self>) -> Option<Self> {
        levels.into_iter().max()
    }
}

/// Direction a score is heading.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    /// Getting safer.
    Improving,
    /// No significant change.
    Stable,
    /// Getting less safe.
    Declining,
}

/// Errors raised when a score payload is out of its documented range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("score field `{field}` is {reason}")]
pub struct ScoreValidationError {
    /// Name of the offending field.
    pub field: &'static str,
    /// Short description of what is wrong.
    pub reason: &'static str,
}

/// A full risk assessment for a single point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    /// Overall safety score, 0 (dangerous) to 100 (safe).
    pub overall_score: f64,
    /// Scorer confidence, 0–100.
    pub confidence: f64,
    /// Risk classification.
    pub alert_level: AlertLevel,
    /// Human-readable advice, most important first.
    pub recommendations: Vec<String>,
    /// Direction the score is heading.
    pub trend: Trend,
    /// Predicted near-future score, 0–100.
    pub prediction_score: f64,
    /// How much the score fluctuates, 0–1.
    pub volatility: f64,
}

impl ScoreResult {
    /// Checks every numeric field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreValidationError`] for the first field that is not
    /// finite or is out of range.
    pub fn validate(self) -> Result<Self, ScoreValidationError> {
        check_range("overallScore", self.overall_score, 0.0, 100.0)?;
        check_range("confidence", self.confidence, 0.0, 100.0)?;
        check_range("predictionScore", self.prediction_score, 0.0, 100.0)?;
        check_range("volatility", self.volatility, 0.0, 1.0)?;
        Ok(self)
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ScoreValidationError> {
    if !value.is_finite() {
        return Err(ScoreValidationError {
            field,
            reason: "not a finite number",
        });
    }
    if value < min || value > max {
        return Err(ScoreValidationError {
            field,
            reason: "out of range",
        });
    }
    Ok(())
}

/// A sampled location within the viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplePoint {
    /// Stable identifier within a run (e.g. `"cell-2-3"`).
    pub id: String,
    /// Jittered location.
    pub position: LatLng,
    /// Land-use classification.
    pub area_type: AreaType,
    /// Sampling-order weight in `[0, 1]`; not a safety measure.
    pub priority: f64,
}

/// A scored, shaped region ready for display.
///
/// Either a single cell built from one [`SamplePoint`], or a merged region
/// whose [`Self::id`] encodes its constituents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Area {
    /// Cell id, or a `merged:`-prefixed list of member ids.
    pub id: String,
    /// Simple closed ring (first vertex not repeated), at least 3 vertices.
    pub boundary: Vec<LatLng>,
    /// Representative center.
    pub center: LatLng,
    /// Safety score, 0–100. Always present.
    pub safety_score: f64,
    /// Land-use classification.
    pub area_type: AreaType,
    /// Full assessment, absent when the score came from the fallback.
    pub score_result: Option<ScoreResult>,
    /// Lowest alert level a bare score may report. Set on merged areas
    /// so a member's level survives the score average.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_floor: Option<AlertLevel>,
    /// Ids of nearby cells, used for merge adjacency.
    pub neighbors: Vec<String>,
    /// When this area was generated.
    pub last_updated: DateTime<Utc>,
}

impl Area {
    /// Alert level from the score result, or derived from the bare score
    /// and raised to [`Self::alert_floor`].
    #[must_use]
    pub fn alert_level(&self) -> AlertLevel {
        self.score_result.as_ref().map_or_else(
            || {
                let derived = AlertLevel::from_score(self.safety_score);
                self.alert_floor.map_or(derived, |floor| derived.max(floor))
            },
            |r| r.alert_level,
        )
    }

    /// Scorer confidence, if a full score result is attached.
    #[must_use]
    pub fn confidence(&self) -> Option<f64> {
        self.score_result.as_ref().map(|r| r.confidence)
    }

    /// Returns `true` if this area was synthesized from several cells.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.id.starts_with(MERGED_ID_PREFIX)
    }

    /// Ids of the cells this area was built from.
    ///
    /// A plain cell returns its own id.
    #[must_use]
    pub fn member_ids(&self) -> Vec<&str> {
        self.id
            .strip_prefix(MERGED_ID_PREFIX)
            .map_or_else(|| vec![self.id.as_str()], |rest| {
                rest.split(MERGED_ID_SEPARATOR).collect()
            })
    }

    /// Presentation hints derived from this area's attributes.
    #[must_use]
    pub fn style(&self) -> AreaStyle {
        AreaStyle::for_area(self)
    }
}

/// Builds the id of a merged area from its member ids.
#[must_use]
pub fn merged_id<S: AsRef<str>>(member_ids: &[S]) -> String {
    let mut id = String::from(MERGED_ID_PREFIX);
    for (i, member) in member_ids.iter().enumerate() {
        if i > 0 {
            id.push(MERGED_ID_SEPARATOR);
        }
        id.push_str(member.as_ref());
    }
    id
}

/// Deterministic hash of a coordinate quantized to 1e-4 degrees.
///
/// `salt` separates independent uses of the same coordinate (area type
/// classification vs. score perturbation).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn coordinate_hash(position: LatLng, salt: u64) -> u64 {
    let lat = (position.lat * 10_000.0).round() as i64 as u64;
    let lng = (position.lng * 10_000.0).round() as i64 as u64;
    splitmix64(lat ^ lng.rotate_left(32) ^ salt)
}

const fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(n: f64, e: f64, s: f64, w: f64) -> BoundingBox {
        BoundingBox::new(LatLng::new(n, e), LatLng::new(s, w))
    }

    #[test]
    fn rejects_nan_and_out_of_range_coordinates() {
        assert!(LatLng::new(f64::NAN, 0.0).validate().is_err());
        assert!(LatLng::new(0.0, f64::INFINITY).validate().is_err());
        assert!(LatLng::new(91.0, 0.0).validate().is_err());
        assert!(LatLng::new(0.0, -180.5).validate().is_err());
        assert!(LatLng::new(40.7, -74.0).validate().is_ok());
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = bbox(40.0, -74.0, 41.0, -75.0).validate().unwrap_err();
        assert!(matches!(err, CoordinateError::InvertedBounds { .. }));
    }

    #[test]
    fn zero_width_box_is_valid_but_degenerate() {
        let b = bbox(40.0, -74.0, 40.0, -74.1).validate().unwrap();
        assert!(b.is_degenerate());
        assert!(!bbox(40.1, -74.0, 40.0, -74.1).is_degenerate());
    }

    #[test]
    fn clamp_keeps_points_inside() {
        let b = bbox(1.0, 1.0, 0.0, 0.0);
        let clamped = b.clamp(LatLng::new(2.0, -1.0));
        assert!(b.contains(clamped));
        assert_eq!(clamped, LatLng::new(1.0, 0.0));
    }

    #[test]
    fn alert_levels_order_by_severity() {
        assert!(AlertLevel::Safe < AlertLevel::Caution);
        assert!(AlertLevel::Caution < AlertLevel::Warning);
        assert!(AlertLevel::Warning < AlertLevel::Danger);
        assert_eq!(
            AlertLevel::most_severe([AlertLevel::Caution, AlertLevel::Danger, AlertLevel::Safe]),
            Some(AlertLevel::Danger)
        );
        assert_eq!(AlertLevel::most_severe(std::iter::empty()), None);
    }

    #[test]
    fn alert_level_from_score_buckets() {
        assert_eq!(AlertLevel::from_score(90.0), AlertLevel::Safe);
        assert_eq!(AlertLevel::from_score(60.0), AlertLevel::Caution);
        assert_eq!(AlertLevel::from_score(40.0), AlertLevel::Warning);
        assert_eq!(AlertLevel::from_score(10.0), AlertLevel::Danger);
    }

    #[test]
    fn enums_parse_from_snake_case() {
        assert_eq!("transit".parse::<AreaType>().unwrap(), AreaType::Transit);
        assert_eq!("danger".parse::<AlertLevel>().unwrap(), AlertLevel::Danger);
        assert_eq!(Trend::Declining.as_ref(), "declining");
    }

    #[test]
    fn score_result_validation_catches_bad_fields() {
        let good = ScoreResult {
            overall_score: 70.0,
            confidence: 80.0,
            alert_level: AlertLevel::Caution,
            recommendations: vec![],
            trend: Trend::Stable,
            prediction_score: 68.0,
            volatility: 0.2,
        };
        assert!(good.clone().validate().is_ok());

        let err = ScoreResult {
            overall_score: 130.0,
            ..good.clone()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "overallScore");

        let err = ScoreResult {
            volatility: f64::NAN,
            ..good
        }
        .validate()
        .unwrap_err();
        assert_eq!(err.field, "volatility");
    }

    #[test]
    fn merged_ids_round_trip_member_list() {
        let id = merged_id(&["cell-0-0", "cell-0-1", "cell-1-1"]);
        assert_eq!(id, "merged:cell-0-0+cell-0-1+cell-1-1");

        let area = Area {
            id,
            boundary: vec![],
            center: LatLng::new(0.0, 0.0),
            safety_score: 50.0,
            area_type: AreaType::Park,
            score_result: None,
            alert_floor: None,
            neighbors: vec![],
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        };
        assert!(area.is_merged());
        assert_eq!(area.member_ids(), vec!["cell-0-0", "cell-0-1", "cell-1-1"]);
        assert_eq!(area.alert_level(), AlertLevel::Warning);

        let floored = Area {
            alert_floor: Some(AlertLevel::Danger),
            ..area.clone()
        };
        assert_eq!(floored.alert_level(), AlertLevel::Danger);

        let below = Area {
            alert_floor: Some(AlertLevel::Safe),
            ..area
        };
        assert_eq!(below.alert_level(), AlertLevel::Warning);
    }

    #[test]
    fn coordinate_hash_is_stable_and_salted() {
        let p = LatLng::new(40.7128, -74.0060);
        assert_eq!(coordinate_hash(p, 1), coordinate_hash(p, 1));
        assert_ne!(coordinate_hash(p, 1), coordinate_hash(p, 2));
    }

    #[test]
    fn area_serializes_in_camel_case() {
        let area = Area {
            id: "cell-0-0".to_string(),
            boundary: vec![LatLng::new(0.0, 0.0)],
            center: LatLng::new(0.0, 0.0),
            safety_score: 80.0,
            area_type: AreaType::Residential,
            score_result: None,
            alert_floor: None,
            neighbors: vec!["cell-0-1".to_string()],
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&area).unwrap();
        assert_eq!(json["safetyScore"], 80.0);
        assert_eq!(json["areaType"], "residential");
        assert!(json["scoreResult"].is_null());
        assert!(json.get("alertFloor").is_none());
    }
}
