//! GeoJSON export.
//!
//! Areas become `Polygon` features with closed `[lng, lat]` rings and
//! their attributes plus style hints as properties.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};
use safezone_area_models::Area;
use serde_json::json;

fn ring(area: &Area) -> Vec<Vec<f64>> {
    let mut ring: Vec<Vec<f64>> = area.boundary.iter().map(|p| vec![p.lng, p.lat]).collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    ring
}

fn properties(area: &Area) -> JsonObject {
    let style = area.style();
    let mut props = JsonObject::new();

    props.insert("safetyScore".into(), json!(area.safety_score));
    props.insert("areaType".into(), json!(area.area_type.as_ref()));
    props.insert("alertLevel".into(), json!(area.alert_level().as_ref()));
    props.insert("merged".into(), json!(area.is_merged()));
    props.insert("members".into(), json!(area.member_ids()));
    props.insert("neighbors".into(), json!(area.neighbors));
    props.insert("centerLat".into(), json!(area.center.lat));
    props.insert("centerLng".into(), json!(area.center.lng));
    props.insert("lastUpdated".into(), json!(area.last_updated.to_rfc3339()));

    if let Some(result) = &area.score_result {
        props.insert("confidence".into(), json!(result.confidence));
        props.insert("trend".into(), json!(result.trend.as_ref()));
        props.insert("predictionScore".into(), json!(result.prediction_score));
        props.insert("volatility".into(), json!(result.volatility));
        props.insert("recommendations".into(), json!(result.recommendations));
    }

    props.insert("fillColor".into(), json!(style.fill_color));
    props.insert("strokeColor".into(), json!(style.stroke_color));
    props.insert("fillOpacity".into(), json!(style.fill_opacity));
    props.insert("strokeWidth".into(), json!(style.stroke_width));
    props.insert("zIndex".into(), json!(style.z_index));

    props
}

/// Converts one area to a GeoJSON feature.
#[must_use]
pub fn to_feature(area: &Area) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![ring(area)]))),
        id: Some(Id::String(area.id.clone())),
        properties: Some(properties(area)),
        foreign_members: None,
    }
}

/// Converts areas to a GeoJSON feature collection, preserving order.
#[must_use]
pub fn to_feature_collection(areas: &[Area]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: areas.iter().map(to_feature).collect(),
        foreign_members: None,
    }
}
