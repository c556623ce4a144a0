//! District boundaries and exclusion zones.
//!
//! Exclusions have their own lifecycle and are not tied to a district row.
//! The exclusions of a district are whichever exclusion polygons intersect
//! its boundary at read time.

use duckdb::Connection;
use geo::{BoundingRect as _, Intersects as _, Polygon};
use site_scout_density::RegionGeometry;
use site_scout_geography_models::{ExclusionReason, RegionSummary};
use site_scout_spatial::geojson_io::{
    parse_multipolygon, parse_named_polygons, parse_polygon, polygon_to_geojson,
};

use crate::DbError;

/// Inserts a district and returns its id.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] for an empty polygon, or
/// [`DbError::Database`] if the insert fails.
pub fn insert_region(conn: &Connection, name: &str, boundary: &Polygon<f64>) -> Result<i64, DbError> {
    let rect = boundary.bounding_rect().ok_or_else(|| DbError::Conversion {
        message: format!("region {name:?} has an empty boundary"),
    })?;

    let id: i64 = conn.query_row(
        "INSERT INTO regions (id, name, boundary_geojson, min_lat, min_lon, max_lat, max_lon)
         VALUES (nextval('regions_id_seq'), ?, ?, ?, ?, ?, ?)
         RETURNING id",
        duckdb::params![
            name,
            polygon_to_geojson(boundary),
            rect.min().y,
            rect.min().x,
            rect.max().y,
            rect.max().x,
        ],
        |row| row.get(0),
    )?;

    Ok(id)
}

/// Imports every polygonal feature of a `GeoJSON` `FeatureCollection` as a
/// district. Features without a `name` property are named by position.
///
/// # Errors
///
/// Returns [`DbError`] if the document cannot be parsed or an insert fails.
pub fn import_regions(conn: &Connection, geojson: &str) -> Result<Vec<RegionSummary>, DbError> {
    let features = parse_named_polygons(geojson)?;
    let mut imported = Vec::with_capacity(features.len());

    for (i, feature) in features.into_iter().enumerate() {
        let name = feature
            .name
            .unwrap_or_else(|| format!("Region {}", i + 1));
        let id = insert_region(conn, &name, &feature.polygon)?;
        log::debug!("Imported region {id} ({name})");
        imported.push(RegionSummary { id, name });
    }

    log::info!("Imported {} regions", imported.len());
    Ok(imported)
}

/// Lists every district, ordered by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn list_regions(conn: &Connection) -> Result<Vec<RegionSummary>, DbError> {
    let mut stmt = conn.prepare("SELECT id, name FROM regions ORDER BY id")?;
    stmt.raw_execute()?;

    let mut regions = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        regions.push(RegionSummary {
            id: row.get(0)?,
            name: row.get(1)?,
        });
    }

    Ok(regions)
}

/// Returns a district's boundary, or `None` if the id is unknown.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the stored geometry is
/// malformed.
pub fn get_boundary(conn: &Connection, region_id: i64) -> Result<Option<Polygon<f64>>, DbError> {
    let mut stmt = conn.prepare("SELECT boundary_geojson FROM regions WHERE id = ?")?;
    stmt.raw_bind_parameter(1, region_id)?;
    stmt.raw_execute()?;

    let mut rows = stmt.raw_query();
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let text: String = row.get(0)?;

    Ok(Some(parse_polygon(&text)?))
}

/// Adds an exclusion zone and returns its id.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn insert_exclusion(
    conn: &Connection,
    name: &str,
    reason: ExclusionReason,
    polygon: &Polygon<f64>,
) -> Result<i64, DbError> {
    let id: i64 = conn.query_row(
        "INSERT INTO exclusions (id, name, reason, boundary_geojson)
         VALUES (nextval('exclusions_id_seq'), ?, ?, ?)
         RETURNING id",
        duckdb::params![name, reason.as_ref(), polygon_to_geojson(polygon)],
        |row| row.get(0),
    )?;

    log::info!("Added {reason} exclusion {id} ({name})");
    Ok(id)
}

/// Adds every member of a `GeoJSON` Polygon or `MultiPolygon` as its own
/// exclusion row under the same name and reason. Returns the new ids.
///
/// # Errors
///
/// Returns [`DbError`] if the document has no polygon or an insert fails.
pub fn import_exclusion(
    conn: &Connection,
    name: &str,
    reason: ExclusionReason,
    geojson: &str,
) -> Result<Vec<i64>, DbError> {
    let members = parse_multipolygon(geojson)?;
    if members.0.is_empty() {
        return Err(DbError::Conversion {
            message: format!("exclusion {name:?} has no polygons"),
        });
    }

    members
        .0
        .iter()
        .map(|polygon| insert_exclusion(conn, name, reason, polygon))
        .collect()
}

/// Every exclusion polygon that intersects `boundary`.
///
/// Rows whose geometry fails to parse are skipped with a warning.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn exclusions_intersecting(
    conn: &Connection,
    boundary: &Polygon<f64>,
) -> Result<Vec<Polygon<f64>>, DbError> {
    let mut stmt = conn.prepare("SELECT id, boundary_geojson FROM exclusions ORDER BY id")?;
    stmt.raw_execute()?;

    let mut exclusions = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let id: i64 = row.get(0)?;
        let text: String = row.get(1)?;

        match parse_polygon(&text) {
            Ok(polygon) if polygon.intersects(boundary) => exclusions.push(polygon),
            Ok(_) => {}
            Err(e) => log::warn!("Exclusion {id} has unreadable geometry: {e}"),
        }
    }

    Ok(exclusions)
}

/// A district's boundary together with the exclusions that touch it.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails or the boundary is malformed.
pub fn region_geometry(conn: &Connection, region_id: i64) -> Result<Option<RegionGeometry>, DbError> {
    let Some(boundary) = get_boundary(conn, region_id)? else {
        return Ok(None);
    };
    let exclusions = exclusions_intersecting(conn, &boundary)?;

    Ok(Some(RegionGeometry {
        boundary,
        exclusions,
    }))
}

/// Axis-aligned bounds of a district as `(min_lat, min_lon, max_lat,
/// max_lon)`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn region_bounds(conn: &Connection, region_id: i64) -> Result<Option<[f64; 4]>, DbError> {
    let mut stmt =
        conn.prepare("SELECT min_lat, min_lon, max_lat, max_lon FROM regions WHERE id = ?")?;
    stmt.raw_bind_parameter(1, region_id)?;
    stmt.raw_execute()?;

    let mut rows = stmt.raw_query();
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    Ok(Some([row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?]))
}

#[cfg(test)]
mod tests {
    use geo::polygon;
    use site_scout_geography_models::LatLon;

    use super::*;
    use crate::db::open_in_memory;

    fn square(offset: f64) -> Polygon<f64> {
        polygon![
            (x: offset, y: offset),
            (x: offset + 1.0, y: offset),
            (x: offset + 1.0, y: offset + 1.0),
            (x: offset, y: offset + 1.0),
            (x: offset, y: offset),
        ]
    }

    #[test]
    fn regions_round_trip_through_geojson() {
        let conn = open_in_memory().unwrap();
        let id = insert_region(&conn, "District 6", &square(0.0)).unwrap();

        assert_eq!(get_boundary(&conn, id).unwrap(), Some(square(0.0)));
        assert!(get_boundary(&conn, id + 100).unwrap().is_none());
        assert_eq!(region_bounds(&conn, id).unwrap(), Some([0.0, 0.0, 1.0, 1.0]));

        let listed = list_regions(&conn).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "District 6");
    }

    #[test]
    fn import_names_unnamed_features() {
        let conn = open_in_memory().unwrap();
        let fc = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"name":"North"},
             "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}},
            {"type":"Feature","properties":{},
             "geometry":{"type":"Polygon","coordinates":[[[2,2],[3,2],[3,3],[2,3],[2,2]]]}}
        ]}"#;

        let imported = import_regions(&conn, fc).unwrap();
        let names: Vec<&str> = imported.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["North", "Region 2"]);
        assert!(imported[1].id > imported[0].id);
    }

    #[test]
    fn every_multipolygon_member_becomes_an_exclusion() {
        let conn = open_in_memory().unwrap();
        let id = insert_region(&conn, "Center", &square(0.0)).unwrap();
        let banned = r#"{"type":"MultiPolygon","coordinates":[
            [[[0.1,0.1],[0.3,0.1],[0.3,0.3],[0.1,0.3],[0.1,0.1]]],
            [[[0.6,0.6],[0.8,0.6],[0.8,0.8],[0.6,0.8],[0.6,0.6]]]
        ]}"#;

        let ids = import_exclusion(&conn, "Base", ExclusionReason::Military, banned).unwrap();
        assert_eq!(ids.len(), 2);

        let region = region_geometry(&conn, id).unwrap().unwrap().to_region().unwrap();
        assert!(!region.is_valid_site(LatLon::new(0.2, 0.2)));
        assert!(!region.is_valid_site(LatLon::new(0.7, 0.7)));
        assert!(region.is_valid_site(LatLon::new(0.5, 0.5)));
    }

    #[test]
    fn only_intersecting_exclusions_are_loaded() {
        let conn = open_in_memory().unwrap();
        let id = insert_region(&conn, "Center", &square(0.0)).unwrap();
        insert_exclusion(&conn, "Airport", ExclusionReason::Airport, &square(0.5)).unwrap();
        insert_exclusion(&conn, "Lake", ExclusionReason::Lake, &square(5.0)).unwrap();

        let geometry = region_geometry(&conn, id).unwrap().unwrap();
        assert_eq!(geometry.exclusions, vec![square(0.5)]);
        assert!(region_geometry(&conn, id + 1).unwrap().is_none());
    }
}
