//! Deterministic fallback scoring.
//!
//! Used whenever the real scorer is skipped, fails, or times out. The
//! score depends only on `(position, area type, hour of day)`, so repeated
//! runs over the same viewport produce identical output.

use safezone_area_models::{AlertLevel, AreaType, LatLng, ScoreResult, Trend, coordinate_hash};

use crate::{AreaScorer, ScoreOptions, ScoringError};

/// Score every fallback computation starts from.
const BASE_SCORE: f64 = 60.0;

/// Half-width of the positional perturbation.
const PERTURBATION_RANGE: f64 = 8.0;

/// Lowest score the fallback will report.
pub const MIN_FALLBACK_SCORE: f64 = 20.0;

/// Highest score the fallback will report.
pub const MAX_FALLBACK_SCORE: f64 = 95.0;

/// Hash salt separating the perturbation from area type classification.
const PERTURBATION_SALT: u64 = 0x5AFE_5C0E;

/// Confidence attached to results produced by [`FallbackScorer`].
const FALLBACK_CONFIDENCE: f64 = 40.0;

/// Score adjustment for each land-use type.
#[must_use]
pub const fn type_bonus(area_type: AreaType) -> f64 {
    match area_type {
        AreaType::Residential => 10.0,
        AreaType::Commercial | AreaType::Park => 5.0,
        AreaType::Transit => -5.0,
        AreaType::Industrial => -10.0,
        AreaType::Emergency => 15.0,
    }
}

/// Score adjustment for the hour of day (0–23).
#[must_use]
pub const fn time_bonus(hour_of_day: u32) -> f64 {
    match hour_of_day {
        7..=18 => 10.0,
        19..=21 => 0.0,
        _ => -10.0,
    }
}

/// Bounded positional perturbation in `[-8, 8)`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn perturbation(position: LatLng) -> f64 {
    let hash = coordinate_hash(position, PERTURBATION_SALT);
    let unit = (hash >> 11) as f64 / (1u64 << 53) as f64;
    unit.mul_add(2.0 * PERTURBATION_RANGE, -PERTURBATION_RANGE)
}

/// Computes the fallback safety score, clamped to `[20, 95]`.
#[must_use]
pub fn fallback_score(position: LatLng, area_type: AreaType, hour_of_day: u32) -> f64 {
    let raw = BASE_SCORE + type_bonus(area_type) + time_bonus(hour_of_day) + perturbation(position);
    raw.clamp(MIN_FALLBACK_SCORE, MAX_FALLBACK_SCORE)
}

/// Generic advice for an alert level, most important first.
#[must_use]
pub fn recommendations_for(level: AlertLevel) -> Vec<String> {
    let advice: &[&str] = match level {
        AlertLevel::Safe => &["Area is generally safe", "Stay aware of your surroundings"],
        AlertLevel::Caution => &[
            "Stay on well-lit main streets",
            "Keep valuables out of sight",
        ],
        AlertLevel::Warning => &[
            "Avoid walking alone after dark",
            "Share your location with a trusted contact",
            "Prefer busy, well-lit routes",
        ],
        AlertLevel::Danger => &[
            "Avoid this area if possible",
            "Share your location with a trusted contact",
            "Keep emergency contacts ready",
            "Travel in a group",
        ],
    };
    advice.iter().map(ToString::to_string).collect()
}

/// A scorer that always answers with the fallback function.
///
/// Useful when no scoring service is configured; unlike the adapter's
/// internal fallback path it produces a full [`ScoreResult`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackScorer;

#[async_trait::async_trait]
impl AreaScorer for FallbackScorer {
    async fn score(
        &self,
        position: LatLng,
        options: &ScoreOptions,
    ) -> Result<ScoreResult, ScoringError> {
        let score = fallback_score(position, options.area_type, options.hour_of_day);
        let alert_level = AlertLevel::from_score(score);

        Ok(ScoreResult {
            overall_score: score,
            confidence: FALLBACK_CONFIDENCE,
            alert_level,
            recommendations: recommendations_for(alert_level),
            trend: Trend::Stable,
            prediction_score: score,
            volatility: 0.1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_deterministic() {
        let p = LatLng::new(40.7128, -74.0060);
        for &area_type in AreaType::all() {
            for hour in 0..24 {
                assert_eq!(
                    fallback_score(p, area_type, hour).to_bits(),
                    fallback_score(p, area_type, hour).to_bits(),
                );
            }
        }
    }

    #[test]
    fn fallback_stays_in_bounds() {
        for i in 0..200 {
            let p = LatLng::new(
                f64::from(i).mul_add(0.0137, -60.0),
                f64::from(i).mul_add(0.4471, -170.0),
            );
            for &area_type in AreaType::all() {
                for hour in 0..24 {
                    let score = fallback_score(p, area_type, hour);
                    assert!(
                        (MIN_FALLBACK_SCORE..=MAX_FALLBACK_SCORE).contains(&score),
                        "{area_type} at {p} hour {hour} scored {score}"
                    );
                }
            }
        }
    }

    #[test]
    fn perturbation_is_bounded() {
        for i in 0..500 {
            let p = LatLng::new(f64::from(i) * 0.001, f64::from(i) * -0.002);
            let d = perturbation(p);
            assert!((-PERTURBATION_RANGE..PERTURBATION_RANGE).contains(&d));
        }
    }

    #[test]
    fn daytime_beats_night() {
        let p = LatLng::new(51.5, -0.12);
        assert!(
            fallback_score(p, AreaType::Residential, 12)
                > fallback_score(p, AreaType::Residential, 2)
        );
    }

    #[test]
    fn emergency_beats_industrial() {
        let p = LatLng::new(51.5, -0.12);
        assert!(
            fallback_score(p, AreaType::Emergency, 12) > fallback_score(p, AreaType::Industrial, 12)
        );
    }

    #[tokio::test]
    async fn fallback_scorer_produces_valid_results() {
        let result = FallbackScorer
            .score(
                LatLng::new(34.05, -118.24),
                &ScoreOptions {
                    area_type: AreaType::Transit,
                    hour_of_day: 23,
                },
            )
            .await
            .unwrap();

        assert!(result.clone().validate().is_ok());
        assert_eq!(result.alert_level, AlertLevel::from_score(result.overall_score));
        assert!(!result.recommendations.is_empty());
    }
}
