//! Cell shaping.
//!
//! Each scored point becomes a regular polygon centered on the point.
//! Vertices that point toward a nearby neighbor are pulled in so adjacent
//! cells do not overlap, and the nearest neighbor ids are recorded for the
//! merger's adjacency graph.

use chrono::{DateTime, Utc};
use safezone_area_models::{Area, LatLng};
use safezone_geometry::{angle_between, orient_ccw, planar_bearing};
use safezone_scoring::ScoredPoint;
use serde::Deserialize;

/// Polygon shaping parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaperConfig {
    /// Number of polygon vertices per cell.
    pub vertex_count: usize,
    /// Scale applied to the grid-derived radius.
    pub radius_scale: f64,
    /// How many of the nearest neighbors are probed per vertex.
    pub probe_neighbors: usize,
    /// Half-width of the probe cone around each vertex bearing, in degrees.
    pub probe_angle_deg: f64,
    /// Vertex distance cap as a fraction of the neighbor distance.
    pub clamp_fraction: f64,
    /// How many nearest neighbor ids are kept on each cell.
    pub neighbor_list_len: usize,
}

impl Default for ShaperConfig {
    fn default() -> Self {
        Self {
            vertex_count: 12,
            radius_scale: 0.6,
            probe_neighbors: 4,
            probe_angle_deg: 30.0,
            clamp_fraction: 0.4,
            neighbor_list_len: 6,
        }
    }
}

/// Radius multiplier for a safety score. Riskier cells are drawn larger.
#[must_use]
pub fn score_multiplier(score: f64) -> f64 {
    if score < 40.0 {
        1.3
    } else if score > 80.0 {
        0.8
    } else {
        1.0
    }
}

/// Indices of the other points ordered by distance from `points[index]`.
///
/// Equal distances keep input order.
fn nearest(points: &[ScoredPoint], index: usize) -> Vec<(usize, f64)> {
    let origin = points[index].point.position;
    let mut others: Vec<(usize, f64)> = points
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(i, p)| (i, origin.planar_distance(p.point.position)))
        .collect();
    others.sort_by(|a, b| a.1.total_cmp(&b.1));
    others
}

/// Builds the polygon for `points[index]`.
#[allow(clippy::cast_precision_loss)]
fn polygon(
    points: &[ScoredPoint],
    index: usize,
    nearby: &[(usize, f64)],
    grid_size: f64,
    config: &ShaperConfig,
) -> Vec<LatLng> {
    let scored = &points[index];
    let center = scored.point.position;
    let radius = grid_size * score_multiplier(scored.safety_score) * config.radius_scale;
    let cone = config.probe_angle_deg.to_radians();
    let vertex_count = config.vertex_count.max(3);

    let probes: Vec<(f64, f64)> = nearby
        .iter()
        .take(config.probe_neighbors)
        .filter(|(_, d)| *d > 0.0)
        .map(|&(i, d)| (planar_bearing(center, points[i].point.position), d))
        .collect();

    let ring = (0..vertex_count)
        .map(|k| {
            let theta = std::f64::consts::TAU * k as f64 / vertex_count as f64;
            let r = probes
                .iter()
                .filter(|(bearing, _)| angle_between(theta, *bearing) <= cone)
                .fold(radius, |r, (_, d)| r.min(config.clamp_fraction * d));

            LatLng::new(r.mul_add(theta.sin(), center.lat), r.mul_add(theta.cos(), center.lng))
        })
        .collect();

    orient_ccw(ring)
}

/// Shapes every scored point into a cell.
///
/// Output order matches input order. Cell ids are the sample point ids.
#[must_use]
pub fn shape_cells(
    points: &[ScoredPoint],
    grid_size: f64,
    config: &ShaperConfig,
    now: DateTime<Utc>,
) -> Vec<Area> {
    (0..points.len())
        .map(|index| {
            let scored = &points[index];
            let nearby = nearest(points, index);
            let boundary = polygon(points, index, &nearby, grid_size, config);
            let neighbors = nearby
                .iter()
                .take(config.neighbor_list_len)
                .map(|&(i, _)| points[i].point.id.clone())
                .collect();

            Area {
                id: scored.point.id.clone(),
                boundary,
                center: scored.point.position,
                safety_score: scored.safety_score,
                area_type: scored.point.area_type,
                score_result: scored.score_result.clone(),
                alert_floor: None,
                neighbors,
                last_updated: now,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use safezone_area_models::{AreaType, SamplePoint};
    use safezone_geometry::{is_simple_ring, signed_area};
    use safezone_scoring::ScoreSource;

    use super::*;

    fn scored(id: &str, lat: f64, lng: f64, score: f64) -> ScoredPoint {
        ScoredPoint {
            point: SamplePoint {
                id: id.to_string(),
                position: LatLng::new(lat, lng),
                area_type: AreaType::Residential,
                priority: 0.5,
            },
            safety_score: score,
            score_result: None,
            source: ScoreSource::Fallback,
        }
    }

    fn max_radius(area: &Area) -> f64 {
        area.boundary
            .iter()
            .map(|v| v.planar_distance(area.center))
            .fold(0.0, f64::max)
    }

    #[test]
    fn lone_cell_is_a_regular_polygon() {
        let cells = shape_cells(
            &[scored("a", 40.0, -74.0, 60.0)],
            0.01,
            &ShaperConfig::default(),
            Utc::now(),
        );

        assert_eq!(cells.len(), 1);
        let cell = &cells[0];
        assert_eq!(cell.boundary.len(), 12);
        assert!(cell.neighbors.is_empty());
        for v in &cell.boundary {
            assert!((v.planar_distance(cell.center) - 0.006).abs() < 1e-12);
        }
        assert!(is_simple_ring(&cell.boundary));
        assert!(signed_area(&cell.boundary) > 0.0, "ring must be counter-clockwise");
    }

    #[test]
    fn radius_depends_on_score() {
        let config = ShaperConfig::default();
        let now = Utc::now();
        let risky = &shape_cells(&[scored("a", 40.0, -74.0, 30.0)], 0.01, &config, now)[0];
        let normal = &shape_cells(&[scored("a", 40.0, -74.0, 60.0)], 0.01, &config, now)[0];
        let safe = &shape_cells(&[scored("a", 40.0, -74.0, 90.0)], 0.01, &config, now)[0];

        assert!(max_radius(risky) > max_radius(normal));
        assert!(max_radius(normal) > max_radius(safe));
    }

    #[test]
    fn vertices_toward_close_neighbor_are_clamped() {
        // Neighbor due east at 0.005 deg; unclamped radius would be 0.006.
        let cells = shape_cells(
            &[scored("a", 40.0, -74.0, 60.0), scored("b", 40.0, -73.995, 60.0)],
            0.01,
            &ShaperConfig::default(),
            Utc::now(),
        );
        let a = &cells[0];

        let east = a
            .boundary
            .iter()
            .find(|v| v.lng > a.center.lng && (v.lat - a.center.lat).abs() < 1e-12)
            .unwrap();
        assert!(east.planar_distance(a.center) <= 0.4 * 0.005 + 1e-12);

        let west = a
            .boundary
            .iter()
            .min_by(|x, y| x.lng.total_cmp(&y.lng))
            .unwrap();
        assert!((west.planar_distance(a.center) - 0.006).abs() < 1e-12);
        assert!(is_simple_ring(&a.boundary));
    }

    #[test]
    fn only_nearest_neighbors_clamp_vertices() {
        // Four neighbors away from east, then a fifth due east at 0.01 deg.
        // Counting it would cap the east vertex at 0.004.
        let points = [
            scored("a", 40.0, -74.0, 60.0),
            scored("north", 40.005, -74.0, 60.0),
            scored("west", 40.0, -74.005, 60.0),
            scored("south", 39.995, -74.0, 60.0),
            scored("north-west", 40.005, -74.006, 60.0),
            scored("east", 40.0, -73.99, 60.0),
        ];
        let east_radius = |config: &ShaperConfig| {
            let cells = shape_cells(&points, 0.01, config, Utc::now());
            let a = &cells[0];
            assert!(is_simple_ring(&a.boundary));
            a.boundary
                .iter()
                .find(|v| v.lng > a.center.lng && (v.lat - a.center.lat).abs() < 1e-12)
                .unwrap()
                .planar_distance(a.center)
        };

        let default = ShaperConfig::default();
        assert!((east_radius(&default) - 0.006).abs() < 1e-12);

        let wider = ShaperConfig {
            probe_neighbors: 5,
            ..default
        };
        assert!(east_radius(&wider) <= 0.4 * 0.01 + 1e-12);
    }

    #[test]
    fn keeps_six_nearest_neighbor_ids() {
        let points: Vec<ScoredPoint> = (0..9)
            .map(|i| scored(&format!("p{i}"), 40.0, -74.0 + f64::from(i) * 0.001, 60.0))
            .collect();
        let cells = shape_cells(&points, 0.01, &ShaperConfig::default(), Utc::now());

        assert_eq!(cells[0].neighbors, vec!["p1", "p2", "p3", "p4", "p5", "p6"]);
        assert!(cells.iter().all(|c| c.neighbors.len() == 6));
        assert!(cells.iter().all(|c| !c.neighbors.contains(&c.id)));
    }

    #[test]
    fn coincident_points_do_not_collapse_the_ring() {
        let cells = shape_cells(
            &[scored("a", 40.0, -74.0, 60.0), scored("b", 40.0, -74.0, 60.0)],
            0.01,
            &ShaperConfig::default(),
            Utc::now(),
        );
        for cell in &cells {
            assert!(is_simple_ring(&cell.boundary));
        }
        assert_eq!(cells[0].neighbors, vec!["b"]);
    }
}
