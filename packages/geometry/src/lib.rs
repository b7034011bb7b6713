#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Planar geometry helpers for safety areas.
//!
//! Coordinates are treated as a flat lat/lng plane; viewports are small
//! enough that projection error is irrelevant for drawing. Provides the
//! monotone-chain convex hull used to outline merged regions, plus ring
//! winding normalization and simplicity checks built on [`geo`].

pub mod hull;
pub mod ring;

use safezone_area_models::LatLng;

pub use hull::convex_hull;
pub use ring::{is_simple_ring, orient_ccw, signed_area};

/// Arithmetic mean of a set of coordinates.
///
/// Returns `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean_center(points: &[LatLng]) -> Option<LatLng> {
    if points.is_empty() {
        return None;
    }

    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));

    Some(LatLng::new(lat / n, lng / n))
}

/// Bearing of `to` as seen from `from`, in radians, measured
/// counter-clockwise from east in the (x = lng, y = lat) plane.
#[must_use]
pub fn planar_bearing(from: LatLng, to: LatLng) -> f64 {
    (to.lat - from.lat).atan2(to.lng - from.lng)
}

/// Smallest absolute difference between two angles, in radians.
#[must_use]
pub fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(std::f64::consts::TAU);
    diff.min(std::f64::consts::TAU - diff)
}
