//! Presentation hints for drawing areas.
//!
//! The map-rendering layer draws whatever it is told; this module decides
//! *what* it is told, deterministically from an area's score, alert level,
//! confidence, and volatility.

use serde::Serialize;

use crate::{AlertLevel, Area};

/// Confidence assumed when an area carries no score result.
const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Drawing style for one area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaStyle {
    /// Fill color as `#rrggbb`, bucketed by safety score.
    pub fill_color: &'static str,
    /// Stroke color as `#rrggbb`, overridden by alert level.
    pub stroke_color: &'static str,
    /// Fill opacity in `[0.1, 0.6]`.
    pub fill_opacity: f64,
    /// Stroke width in screen pixels.
    pub stroke_width: f64,
    /// Stacking order; higher draws on top.
    pub z_index: i32,
}

impl AreaStyle {
    /// Derives the style for an area.
    #[must_use]
    pub fn for_area(area: &Area) -> Self {
        let (confidence, volatility) = area
            .score_result
            .as_ref()
            .map_or((DEFAULT_CONFIDENCE, 0.0), |r| (r.confidence, r.volatility));

        Self::from_parts(area.safety_score, area.alert_level(), confidence, volatility)
    }

    /// Derives a style from raw attributes.
    #[must_use]
    pub fn from_parts(
        safety_score: f64,
        alert_level: AlertLevel,
        confidence: f64,
        volatility: f64,
    ) -> Self {
        let fill_color = fill_for_score(safety_score);

        let stroke_color = match alert_level {
            AlertLevel::Danger => "#b91c1c",
            AlertLevel::Warning => "#d97706",
            AlertLevel::Caution => "#ca8a04",
            AlertLevel::Safe => fill_color,
        };

        let fill_opacity = 0.35f64
            .mul_add(confidence.clamp(0.0, 100.0) / 100.0, 0.15)
            - 0.15 * volatility.clamp(0.0, 1.0);

        let mut z_index = 1;
        if safety_score < 40.0 {
            z_index += 2;
        }
        if alert_level == AlertLevel::Danger {
            z_index += 3;
        }

        Self {
            fill_color,
            stroke_color,
            fill_opacity: fill_opacity.clamp(0.1, 0.6),
            stroke_width: if alert_level >= AlertLevel::Warning {
                3.0
            } else {
                2.0
            },
            z_index,
        }
    }
}

fn fill_for_score(score: f64) -> &'static str {
    if score >= 80.0 {
        "#22c55e"
    } else if score >= 60.0 {
        "#84cc16"
    } else if score >= 40.0 {
        "#f59e0b"
    } else {
        "#ef4444"
    }
}
