//! Weighted combination of a merge group into one area.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use safezone_area_models::{AlertLevel, Area, LatLng, ScoreResult, Trend, merged_id};
use safezone_geometry::{convex_hull, is_simple_ring, mean_center, orient_ccw};

/// Weight given to members without a confidence value.
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Maximum number of recommendations on a merged result.
pub const MAX_RECOMMENDATIONS: usize = 4;

/// Weighted mean of `values`, or the plain mean when every weight is zero.
#[allow(clippy::cast_precision_loss)]
fn weighted_mean(values: impl Iterator<Item = f64>, weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        values.zip(weights).map(|(v, w)| v * w).sum::<f64>() / total
    } else {
        let n = weights.len().max(1) as f64;
        values.sum::<f64>() / n
    }
}

/// Most common trend. Ties resolve to [`Trend::Stable`], or to the first
/// tied trend in member order when stable is not among them.
#[must_use]
pub fn majority_trend(trends: &[Trend]) -> Trend {
    let count = |t: Trend| trends.iter().filter(|&&x| x == t).count();
    let best = [Trend::Improving, Trend::Stable, Trend::Declining]
        .into_iter()
        .map(count)
        .max()
        .unwrap_or(0);

    if best == 0 || count(Trend::Stable) == best {
        return Trend::Stable;
    }
    trends
        .iter()
        .copied()
        .find(|&t| count(t) == best)
        .unwrap_or(Trend::Stable)
}

/// Order-preserving union of recommendation lists, capped.
#[must_use]
pub fn merge_recommendations<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(r.as_str()))
        .take(MAX_RECOMMENDATIONS)
        .cloned()
        .collect()
}

fn dedup_union<'a>(lists: impl IntoIterator<Item = &'a [String]>) -> Vec<String> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn merged_result(results: &[&ScoreResult], safety_score: f64, weights: &[f64]) -> ScoreResult {
    let n = results.len() as f64;
    let trends: Vec<Trend> = results.iter().map(|r| r.trend).collect();

    ScoreResult {
        overall_score: safety_score,
        confidence: results.iter().map(|r| r.confidence).sum::<f64>() / n,
        alert_level: AlertLevel::most_severe(results.iter().map(|r| r.alert_level))
            .unwrap_or(AlertLevel::Safe),
        recommendations: merge_recommendations(results.iter().map(|r| r.recommendations.as_slice())),
        trend: majority_trend(&trends),
        prediction_score: weighted_mean(results.iter().map(|r| r.prediction_score), weights),
        volatility: weighted_mean(results.iter().map(|r| r.volatility), weights),
    }
}

/// Combines a merge group into a single area.
///
/// Members are expected in traversal order; the merged id lists them in
/// that order. Returns `None` for an empty group, or when the members'
/// vertices do not span a simple ring.
#[must_use]
pub fn combine(members: &[&Area], now: DateTime<Utc>) -> Option<Area> {
    let first = members.first()?;

    let weights: Vec<f64> = members
        .iter()
        .map(|a| a.confidence().unwrap_or(DEFAULT_CONFIDENCE))
        .collect();
    let safety_score = weighted_mean(members.iter().map(|a| a.safety_score), &weights);

    let results: Option<Vec<&ScoreResult>> =
        members.iter().map(|a| a.score_result.as_ref()).collect();
    let score_result = results.map(|r| merged_result(&r, safety_score, &weights));
    let alert_floor = if score_result.is_none() {
        AlertLevel::most_severe(members.iter().map(|a| a.alert_level()))
    } else {
        None
    };

    let centers: Vec<LatLng> = members.iter().map(|a| a.center).collect();
    let vertices: Vec<LatLng> = members
        .iter()
        .flat_map(|a| a.boundary.iter().copied())
        .collect();
    let ids: Vec<&str> = members.iter().map(|a| a.id.as_str()).collect();

    let boundary = orient_ccw(convex_hull(&vertices));
    if !is_simple_ring(&boundary) {
        log::debug!("Group {} has no usable outline", merged_id(&ids));
        return None;
    }

    Some(Area {
        id: merged_id(&ids),
        boundary,
        center: mean_center(&centers)?,
        safety_score,
        area_type: first.area_type,
        score_result,
        alert_floor,
        neighbors: dedup_union(members.iter().map(|a| a.neighbors.as_slice())),
        last_updated: now,
    })
}

#[cfg(test)]
mod tests {
    use safezone_area_models::AreaType;
    use safezone_geometry::{hull::cross, is_simple_ring, signed_area};

    use super::*;

    fn square(center: LatLng) -> Vec<LatLng> {
        let d = 0.001;
        vec![
            LatLng::new(center.lat - d, center.lng - d),
            LatLng::new(center.lat - d, center.lng + d),
            LatLng::new(center.lat + d, center.lng + d),
            LatLng::new(center.lat + d, center.lng - d),
        ]
    }

    fn cell(id: &str, lng: f64, score: f64, result: Option<ScoreResult>) -> Area {
        let center = LatLng::new(40.0, lng);
        Area {
            id: id.to_string(),
            boundary: square(center),
            center,
            safety_score: score,
            area_type: AreaType::Park,
            score_result: result,
            alert_floor: None,
            neighbors: vec![],
            last_updated: DateTime::<Utc>::default(),
        }
    }

    fn result(score: f64, confidence: f64, alert: AlertLevel, trend: Trend) -> ScoreResult {
        ScoreResult {
            overall_score: score,
            confidence,
            alert_level: alert,
            recommendations: vec![],
            trend,
            prediction_score: score,
            volatility: 0.2,
        }
    }

    #[test]
    fn confidence_weights_the_score() {
        let a = cell("a", -74.0, 80.0, Some(result(80.0, 90.0, AlertLevel::Safe, Trend::Stable)));
        let b = cell("b", -73.998, 70.0, Some(result(70.0, 10.0, AlertLevel::Caution, Trend::Stable)));
        let merged = combine(&[&a, &b], Utc::now()).unwrap();

        assert!((merged.safety_score - 79.0).abs() < 1e-9);
        let r = merged.score_result.unwrap();
        assert!((r.confidence - 50.0).abs() < 1e-9);
        assert!((r.overall_score - 79.0).abs() < 1e-9);
        assert!((r.volatility - 0.2).abs() < 1e-9);
    }

    #[test]
    fn bare_scores_use_default_weight() {
        let a = cell("a", -74.0, 40.0, None);
        let b = cell("b", -73.998, 50.0, None);
        let merged = combine(&[&a, &b], Utc::now()).unwrap();

        assert!((merged.safety_score - 45.0).abs() < 1e-9);
        assert!(merged.score_result.is_none());
    }

    #[test]
    fn zero_confidence_falls_back_to_plain_mean() {
        let a = cell("a", -74.0, 60.0, Some(result(60.0, 0.0, AlertLevel::Caution, Trend::Stable)));
        let b = cell("b", -73.998, 70.0, Some(result(70.0, 0.0, AlertLevel::Caution, Trend::Stable)));
        let merged = combine(&[&a, &b], Utc::now()).unwrap();
        assert!((merged.safety_score - 65.0).abs() < 1e-9);
    }

    #[test]
    fn mixed_members_drop_the_score_result() {
        let a = cell("a", -74.0, 60.0, Some(result(60.0, 80.0, AlertLevel::Caution, Trend::Stable)));
        let b = cell("b", -73.998, 62.0, None);
        let merged = combine(&[&a, &b], Utc::now()).unwrap();

        assert!(merged.score_result.is_none());
        // 60 * 80 + 62 * 50 over 130
        assert!((merged.safety_score - 7900.0 / 130.0).abs() < 1e-9);
    }

    #[test]
    fn merged_score_within_member_range() {
        let scores = [33.0, 41.5, 38.2, 44.9, 36.0];
        let confidences = [10.0, 95.0, 50.0, 0.0, 70.0];
        let cells: Vec<Area> = (0_u8..)
            .zip(scores.iter().zip(confidences))
            .map(|(i, (&s, c))| {
                cell(
                    &format!("c{i}"),
                    f64::from(i).mul_add(0.002, -74.0),
                    s,
                    Some(result(s, c, AlertLevel::Warning, Trend::Declining)),
                )
            })
            .collect();
        let refs: Vec<&Area> = cells.iter().collect();
        let merged = combine(&refs, Utc::now()).unwrap();

        assert!(merged.safety_score >= 33.0 && merged.safety_score <= 44.9);
    }

    #[test]
    fn alert_is_danger_iff_a_member_is_danger() {
        let safe = cell("a", -74.0, 80.0, Some(result(80.0, 50.0, AlertLevel::Safe, Trend::Stable)));
        let warn = cell("b", -73.998, 70.0, Some(result(70.0, 50.0, AlertLevel::Warning, Trend::Stable)));
        let danger = cell("c", -73.996, 75.0, Some(result(75.0, 50.0, AlertLevel::Danger, Trend::Stable)));

        let without = combine(&[&safe, &warn], Utc::now()).unwrap();
        assert_eq!(without.alert_level(), AlertLevel::Warning);

        let with = combine(&[&safe, &warn, &danger], Utc::now()).unwrap();
        assert_eq!(with.alert_level(), AlertLevel::Danger);
    }

    #[test]
    fn bare_members_keep_the_most_severe_level() {
        let danger = cell("a", -74.0, 34.0, None);
        let warning = cell("b", -73.998, 45.0, None);
        assert_eq!(danger.alert_level(), AlertLevel::Danger);
        assert_eq!(warning.alert_level(), AlertLevel::Warning);

        let merged = combine(&[&danger, &warning], Utc::now()).unwrap();
        assert!(merged.score_result.is_none());
        assert!((merged.safety_score - 39.5).abs() < 1e-9);
        assert_eq!(merged.alert_level(), AlertLevel::Danger);
        assert_eq!(merged.style().stroke_color, danger.style().stroke_color);

        let calm = combine(&[&warning, &cell("c", -73.996, 47.0, None)], Utc::now()).unwrap();
        assert_eq!(calm.alert_level(), AlertLevel::Warning);
    }

    #[test]
    fn collapsed_outlines_are_not_combined() {
        let point = LatLng::new(40.0, -74.0);
        let mut a = cell("a", -74.0, 60.0, None);
        let mut b = cell("b", -74.0, 62.0, None);
        a.boundary = vec![point; 12];
        b.boundary = vec![point; 12];

        assert!(combine(&[&a, &b], Utc::now()).is_none());
    }

    #[test]
    fn trend_majority_with_stable_tie_break() {
        use Trend::{Declining, Improving, Stable};
        assert_eq!(majority_trend(&[Improving, Improving, Declining]), Improving);
        assert_eq!(majority_trend(&[Improving, Declining]), Stable);
        assert_eq!(majority_trend(&[Improving, Stable]), Stable);
        assert_eq!(majority_trend(&[Declining, Declining, Stable, Stable]), Stable);
        assert_eq!(majority_trend(&[]), Stable);
    }

    #[test]
    fn recommendations_are_deduped_and_capped() {
        let a = vec!["lit streets".to_string(), "travel in groups".to_string()];
        let b = vec![
            "travel in groups".to_string(),
            "share location".to_string(),
            "avoid alleys".to_string(),
            "call ahead".to_string(),
        ];
        let merged = merge_recommendations([a.as_slice(), b.as_slice()]);
        assert_eq!(
            merged,
            vec!["lit streets", "travel in groups", "share location", "avoid alleys"]
        );
    }

    #[test]
    fn provenance_center_and_neighbors() {
        let mut a = cell("cell-0-0", -74.0, 60.0, None);
        let mut b = cell("cell-0-1", -73.998, 62.0, None);
        a.neighbors = vec!["cell-0-1".into(), "cell-1-0".into()];
        b.neighbors = vec!["cell-0-0".into(), "cell-1-0".into(), "cell-1-1".into()];

        let merged = combine(&[&a, &b], Utc::now()).unwrap();
        assert_eq!(merged.id, "merged:cell-0-0+cell-0-1");
        assert_eq!(merged.member_ids(), vec!["cell-0-0", "cell-0-1"]);
        assert!((merged.center.lng + 73.999).abs() < 1e-12);
        assert_eq!(
            merged.neighbors,
            vec!["cell-0-1", "cell-1-0", "cell-0-0", "cell-1-1"]
        );
        assert_eq!(merged.area_type, AreaType::Park);
    }

    #[test]
    fn boundary_is_convex_ccw_hull_of_member_vertices() {
        let a = cell("a", -74.0, 60.0, None);
        let b = cell("b", -73.9985, 62.0, None);
        let c = cell("c", -73.997, 61.0, None);
        let merged = combine(&[&a, &b, &c], Utc::now()).unwrap();

        assert!(is_simple_ring(&merged.boundary));
        assert!(signed_area(&merged.boundary) > 0.0);

        let all: Vec<LatLng> = [&a, &b, &c]
            .iter()
            .flat_map(|x| x.boundary.iter().copied())
            .collect();
        assert!(merged.boundary.iter().all(|v| all.contains(v)));

        let n = merged.boundary.len();
        let signs: Vec<bool> = (0..n)
            .map(|i| {
                cross(
                    merged.boundary[i],
                    merged.boundary[(i + 1) % n],
                    merged.boundary[(i + 2) % n],
                ) > 0.0
            })
            .collect();
        assert!(signs.iter().all(|&s| s == signs[0]));
    }

    #[test]
    fn empty_group_yields_nothing() {
        assert!(combine(&[], Utc::now()).is_none());
    }
}
