//! Ring winding and validity checks.
//!
//! Rings are stored open (the first vertex is not repeated). Conversions
//! to [`geo`] types close the ring and map `x = lng`, `y = lat`.

use geo::{Area as _, Coord, LineString, Polygon, Winding as _};
use safezone_area_models::LatLng;

fn to_line_string(ring: &[LatLng]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p.lng, y: p.lat }).collect();
    if let Some(&first) = coords.first() {
        coords.push(first);
    }
    LineString::new(coords)
}

/// Re-orders an open ring so it winds counter-clockwise on the map.
///
/// Rings with fewer than 3 vertices are returned as-is.
#[must_use]
pub fn orient_ccw(ring: Vec<LatLng>) -> Vec<LatLng> {
    if ring.len() < 3 {
        return ring;
    }

    let mut line = to_line_string(&ring);
    line.make_ccw_winding();

    let mut out: Vec<LatLng> = line.coords().map(|c| LatLng::new(c.y, c.x)).collect();
    out.pop();
    out
}

/// Signed area of an open ring in square degrees.
///
/// Positive for counter-clockwise rings on the map.
#[must_use]
pub fn signed_area(ring: &[LatLng]) -> f64 {
    Polygon::new(to_line_string(ring), vec![]).signed_area()
}

/// Returns `true` if the open ring has at least 3 vertices, non-zero
/// area, and no two non-adjacent edges touch.
#[must_use]
pub fn is_simple_ring(ring: &[LatLng]) -> bool {
    let n = ring.len();
    if n < 3 || signed_area(ring).abs() <= f64::EPSILON * f64::EPSILON {
        return false;
    }

    for i in 0..n {
        let (a1, a2) = (ring[i], ring[(i + 1) % n]);
        for j in (i + 1)..n {
            // Adjacent edges share a vertex by construction.
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            let (b1, b2) = (ring[j], ring[(j + 1) % n]);
            if segments_intersect(a1, a2, b1, b2) {
                return false;
            }
        }
    }

    true
}

fn orientation(a: LatLng, b: LatLng, c: LatLng) -> f64 {
    (b.lng - a.lng) * (c.lat - a.lat) - (b.lat - a.lat) * (c.lng - a.lng)
}

fn on_segment(a: LatLng, b: LatLng, p: LatLng) -> bool {
    p.lng >= a.lng.min(b.lng)
        && p.lng <= a.lng.max(b.lng)
        && p.lat >= a.lat.min(b.lat)
        && p.lat <= a.lat.max(b.lat)
}

fn segments_intersect(a1: LatLng, a2: LatLng, b1: LatLng, b2: LatLng) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}
