//! `GeoJSON` parsing and serialization.
//!
//! Region and exclusion polygons are stored as `GeoJSON` text, and density
//! artifacts store their point cloud as a `MultiPoint`. Coordinates are in
//! `GeoJSON` order (`[lon, lat]`).

use geo::{MultiPolygon, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use site_scout_geography_models::LatLon;

use crate::SpatialError;

/// A named polygon extracted from a `FeatureCollection`.
#[derive(Debug, Clone)]
pub struct NamedPolygon {
    /// The feature's `name` property, if present.
    pub name: Option<String>,
    pub polygon: Polygon<f64>,
}

/// Parse a `GeoJSON` string into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types, bare or
/// wrapped in a single `Feature`.
///
/// # Errors
///
/// Returns [`SpatialError::GeoJson`] if the text is not a polygonal
/// geometry.
pub fn parse_multipolygon(geojson_str: &str) -> Result<MultiPolygon<f64>, SpatialError> {
    let geojson: GeoJson = geojson_str.parse().map_err(|e| SpatialError::GeoJson {
        message: format!("{e}"),
    })?;

    let geometry = match geojson {
        GeoJson::Geometry(geom) => geom,
        GeoJson::Feature(Feature {
            geometry: Some(geom),
            ..
        }) => geom,
        _ => {
            return Err(SpatialError::GeoJson {
                message: "expected a Geometry or a Feature with geometry".to_string(),
            });
        }
    };

    geometry_to_multipolygon(geometry)
}

/// Parse a `GeoJSON` string into a single [`Polygon`].
///
/// For a `MultiPolygon` the first polygon is used and the rest are dropped
/// with a warning. Use [`parse_multipolygon`] where every member matters.
///
/// # Errors
///
/// Returns [`SpatialError::GeoJson`] if the text has no polygon.
pub fn parse_polygon(geojson_str: &str) -> Result<Polygon<f64>, SpatialError> {
    let members = parse_multipolygon(geojson_str)?.0;
    if members.len() > 1 {
        log::warn!(
            "MultiPolygon has {} members, keeping only the first",
            members.len()
        );
    }

    members
        .into_iter()
        .next()
        .ok_or_else(|| SpatialError::GeoJson {
            message: "MultiPolygon has no members".to_string(),
        })
}

/// Extracts every polygonal feature from a `FeatureCollection`, keeping the
/// `name` property. Non-polygonal features are skipped with a warning.
///
/// # Errors
///
/// Returns [`SpatialError::GeoJson`] if the text is not a
/// `FeatureCollection`.
pub fn parse_named_polygons(geojson_str: &str) -> Result<Vec<NamedPolygon>, SpatialError> {
    let geojson: GeoJson = geojson_str.parse().map_err(|e| SpatialError::GeoJson {
        message: format!("{e}"),
    })?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(SpatialError::GeoJson {
            message: "expected a FeatureCollection".to_string(),
        });
    };

    let mut polygons = Vec::new();
    for (i, feature) in collection.features.into_iter().enumerate() {
        let name = feature
            .property("name")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let Some(geometry) = feature.geometry else {
            log::warn!("Feature {i} has no geometry, skipping");
            continue;
        };

        match geometry_to_multipolygon(geometry) {
            Ok(mp) => {
                if let Some(polygon) = mp.0.into_iter().next() {
                    polygons.push(NamedPolygon { name, polygon });
                }
            }
            Err(e) => log::warn!("Feature {i} ({name:?}) skipped: {e}"),
        }
    }

    Ok(polygons)
}

fn geometry_to_multipolygon(geometry: Geometry) -> Result<MultiPolygon<f64>, SpatialError> {
    let geo_geom: geo::Geometry<f64> =
        geometry.try_into().map_err(|e: geojson::Error| SpatialError::GeoJson {
            message: format!("{e}"),
        })?;

    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        other => Err(SpatialError::GeoJson {
            message: format!("expected Polygon or MultiPolygon, got {other:?}"),
        }),
    }
}

/// Serializes a polygon as a `GeoJSON` geometry string.
#[must_use]
pub fn polygon_to_geojson(polygon: &Polygon<f64>) -> String {
    GeoJson::from(Geometry::new(Value::from(polygon))).to_string()
}

/// Serializes points as a `GeoJSON` `MultiPoint` geometry string.
#[must_use]
pub fn points_to_multipoint(points: &[LatLon]) -> String {
    let coords = points.iter().map(|p| vec![p.lon, p.lat]).collect();
    GeoJson::from(Geometry::new(Value::MultiPoint(coords))).to_string()
}

/// Parses a `GeoJSON` `MultiPoint` (or single `Point`) back into points,
/// preserving order.
///
/// # Errors
///
/// Returns [`SpatialError::GeoJson`] if the text is not a point geometry
/// or a position has fewer than two coordinates.
pub fn points_from_multipoint(geojson_str: &str) -> Result<Vec<LatLon>, SpatialError> {
    let geojson: GeoJson = geojson_str.parse().map_err(|e| SpatialError::GeoJson {
        message: format!("{e}"),
    })?;

    let GeoJson::Geometry(geometry) = geojson else {
        return Err(SpatialError::GeoJson {
            message: "expected a MultiPoint geometry".to_string(),
        });
    };

    let positions = match geometry.value {
        Value::MultiPoint(positions) => positions,
        Value::Point(position) => vec![position],
        _ => {
            return Err(SpatialError::GeoJson {
                message: "expected a MultiPoint or Point geometry".to_string(),
            });
        }
    };

    positions
        .into_iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Ok(LatLon::new(*lat, *lon)),
            _ => Err(SpatialError::GeoJson {
                message: format!("position {pos:?} has fewer than two coordinates"),
            }),
        })
        .collect()
}

/// Builds a `FeatureCollection` of weighted points, one `Point` feature per
/// entry with a `weight` property. This is the layer a heat map renders.
#[must_use]
pub fn weighted_points_collection(points: &[LatLon], weights: &[f64]) -> String {
    let features = points
        .iter()
        .zip(weights)
        .map(|(p, &w)| {
            let mut properties = JsonObject::new();
            properties.insert("weight".to_string(), serde_json::Value::from(w));
            Feature {
                bbox: None,
                geometry: Some(Geometry::new(Value::Point(vec![p.lon, p.lat]))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn parses_polygon_and_multipolygon() {
        let poly = r#"{"type":"Polygon","coordinates":[[[51.3,35.7],[51.4,35.7],[51.4,35.8],[51.3,35.7]]]}"#;
        assert_eq!(parse_multipolygon(poly).unwrap().0.len(), 1);

        let multi = r#"{"type":"MultiPolygon","coordinates":[[[[0,0],[1,0],[1,1],[0,0]]],[[[2,2],[3,2],[3,3],[2,2]]]]}"#;
        let first = parse_polygon(multi).unwrap();
        assert!((first.exterior().0[1].x - 1.0).abs() < 1e-12);
    }

    #[test]
    fn multipolygon_keeps_every_member() {
        let text = r#"{"type":"Feature","properties":{},"geometry":{"type":"MultiPolygon","coordinates":[
            [[[0.1,0.1],[0.3,0.1],[0.3,0.3],[0.1,0.3],[0.1,0.1]]],
            [[[0.6,0.6],[0.8,0.6],[0.8,0.8],[0.6,0.8],[0.6,0.6]]]
        ]}}"#;

        let mp = parse_multipolygon(text).unwrap();
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[1].exterior().0[0], geo::coord! { x: 0.6, y: 0.6 });
        assert_eq!(parse_polygon(text).unwrap(), mp.0[0]);
    }

    #[test]
    fn rejects_points_as_polygon() {
        let point = r#"{"type":"Point","coordinates":[1.0,2.0]}"#;
        assert!(matches!(
            parse_multipolygon(point),
            Err(SpatialError::GeoJson { .. })
        ));
    }

    #[test]
    fn named_polygons_skip_non_polygons() {
        let fc = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"District 1"},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}},
            {"type":"Feature","properties":{"name":"A point"},
             "geometry":{"type":"Point","coordinates":[0,0]}}
        ]}"#;
        let named = parse_named_polygons(fc).unwrap();
        assert_eq!(named.len(), 1);
        assert_eq!(named[0].name.as_deref(), Some("District 1"));
    }

    #[test]
    fn multipoint_preserves_order_and_axis() {
        let points = vec![LatLon::new(35.7, 51.3), LatLon::new(35.8, 51.4)];
        let text = points_to_multipoint(&points);
        assert!(text.contains("51.3"));
        assert_eq!(points_from_multipoint(&text).unwrap(), points);
    }

    #[test]
    fn polygon_survives_serialization() {
        let p = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 1.0), (x: 0.0, y: 0.0)];
        let back = parse_polygon(&polygon_to_geojson(&p)).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn weighted_collection_has_one_feature_per_point() {
        let text = weighted_points_collection(
            &[LatLon::new(1.0, 2.0), LatLon::new(3.0, 4.0)],
            &[0.25, 1.0],
        );
        let GeoJson::FeatureCollection(fc) = text.parse::<GeoJson>().unwrap() else {
            panic!("not a collection");
        };
        assert_eq!(fc.features.len(), 2);
        assert_eq!(
            fc.features[0].property("weight").and_then(serde_json::Value::as_f64),
            Some(0.25)
        );
    }
}
