//! `GeoJSON` export of black spots for map renderers.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};
use safe_route_cluster_models::BlackSpot;

/// Builds a `FeatureCollection` with one `Point` feature per black spot.
///
/// Geometry follows `GeoJSON` axis order (`[longitude, latitude]`).
/// Properties carry `cluster_id`, `total_crashes` and `risk_level`.
#[must_use]
pub fn black_spots_to_geojson(black_spots: &[BlackSpot]) -> FeatureCollection {
    let features = black_spots
        .iter()
        .map(|spot| {
            let mut properties = JsonObject::new();
            properties.insert("cluster_id".to_owned(), JsonValue::from(spot.cluster_id));
            properties.insert(
                "total_crashes".to_owned(),
                JsonValue::from(spot.total_crashes),
            );
            properties.insert(
                "risk_level".to_owned(),
                JsonValue::from(spot.risk_level.as_ref()),
            );

            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![
                    spot.centroid_longitude,
                    spot.centroid_latitude,
                ]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Serializes black spots as a pretty-printed `GeoJSON` document.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn black_spots_to_geojson_string(black_spots: &[BlackSpot]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&black_spots_to_geojson(black_spots))
}
