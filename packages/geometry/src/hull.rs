//! Monotone-chain (Andrew's) convex hull.
//!
//! Points are ordered lexicographically by `(lat, lng)` and the hull is
//! built as a lower and an upper chain. Only vertices of the input are
//! ever emitted, so the hull is always a subset of the input points.

use safezone_area_models::LatLng;

/// Orientation of the turn `o -> a -> b` in the (lat, lng) plane.
///
/// Positive for a left turn, negative for a right turn, zero when the
/// three points are collinear.
#[must_use]
pub fn cross(o: LatLng, a: LatLng, b: LatLng) -> f64 {
    (a.lat - o.lat).mul_add(b.lng - o.lng, -((a.lng - o.lng) * (b.lat - o.lat)))
}

/// Computes the convex hull of `points`.
///
/// Collinear points on the hull boundary are dropped. The returned ring
/// does not repeat its first vertex.
///
/// If fewer than 3 distinct points are supplied, the input is returned
/// unchanged. If all points are collinear, only the two extreme points
/// are returned.
#[must_use]
pub fn convex_hull(points: &[LatLng]) -> Vec<LatLng> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|a, b| a.lat.total_cmp(&b.lat).then(a.lng.total_cmp(&b.lng)));
    sorted.dedup();

    if sorted.len() < 3 {
        return points.to_vec();
    }

    let mut lower: Vec<LatLng> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<LatLng> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    // Each chain ends where the other begins.
    lower.pop();
    upper.pop();
    lower.extend(upper);

    log::trace!(
        "convex hull reduced {} points to {} vertices",
        points.len(),
        lower.len()
    );

    lower
}
