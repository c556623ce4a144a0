//! Existing business locations.
//!
//! Businesses are not attached to a district. A district's businesses are
//! the ones within a margin of its boundary, found with a bounding-box
//! prefilter in SQL and an exact distance check in Rust.

use std::io::Read;

use duckdb::Connection;
use geo::Polygon;
use serde::Deserialize;
use site_scout_geography_models::{BusinessRecord, LatLon, SubcategoryRef};
use site_scout_spatial::region::within_margin;

use crate::DbError;

/// Number of rows per INSERT chunk.
const CHUNK_SIZE: usize = 1_000;

/// One CSV import row: `name,category,subcategory,lat,lon[,rating]`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    name: Option<String>,
    category: String,
    subcategory: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    rating: Option<f64>,
}

impl From<CsvRow> for BusinessRecord {
    fn from(row: CsvRow) -> Self {
        Self {
            name: row.name.filter(|n| !n.trim().is_empty()),
            category: row.category.trim().to_string(),
            subcategory: row.subcategory.trim().to_string(),
            location: LatLon::new(row.lat, row.lon),
            rating: row.rating,
        }
    }
}

/// Inserts businesses in chunks. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any insert fails.
pub fn insert_businesses(conn: &Connection, businesses: &[BusinessRecord]) -> Result<u64, DbError> {
    let mut total = 0u64;

    for chunk in businesses.chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO businesses (id, name, category, subcategory, lat, lon, rating) VALUES ",
        );
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(nextval('businesses_id_seq'), ?, ?, ?, ?, ?, ?)");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;
        for business in chunk {
            stmt.raw_bind_parameter(param_idx, business.name.as_deref())?;
            stmt.raw_bind_parameter(param_idx + 1, &business.category)?;
            stmt.raw_bind_parameter(param_idx + 2, &business.subcategory)?;
            stmt.raw_bind_parameter(param_idx + 3, business.location.lat)?;
            stmt.raw_bind_parameter(param_idx + 4, business.location.lon)?;
            stmt.raw_bind_parameter(param_idx + 5, business.rating)?;
            param_idx += 6;
        }

        let rows = stmt.raw_execute()?;
        total += rows as u64;
    }

    Ok(total)
}

/// Reads businesses from CSV with a header row
/// `name,category,subcategory,lat,lon[,rating]`.
///
/// Rows with non-finite coordinates are skipped with a warning.
///
/// # Errors
///
/// Returns [`DbError::Csv`] if a row cannot be parsed.
pub fn read_csv(reader: impl Read) -> Result<Vec<BusinessRecord>, DbError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for (i, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let record = BusinessRecord::from(row?);
        if !record.location.lat.is_finite() || !record.location.lon.is_finite() {
            log::warn!("CSV row {} has a non-finite coordinate, skipping", i + 1);
            continue;
        }
        records.push(record);
    }

    Ok(records)
}

/// Imports businesses from CSV. Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if the CSV is malformed or an insert fails.
pub fn import_csv(conn: &Connection, reader: impl Read) -> Result<u64, DbError> {
    let records = read_csv(reader)?;
    let inserted = insert_businesses(conn, &records)?;
    log::info!("Imported {inserted} businesses");
    Ok(inserted)
}

/// Businesses within `margin` degrees of `boundary`, optionally limited to
/// one subcategory, in insertion order.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn businesses_near(
    conn: &Connection,
    boundary: &Polygon<f64>,
    bounds: [f64; 4],
    subcategory: Option<&str>,
    margin: f64,
) -> Result<Vec<BusinessRecord>, DbError> {
    let [min_lat, min_lon, max_lat, max_lon] = bounds;

    let mut sql = String::from(
        "SELECT name, category, subcategory, lat, lon, rating FROM businesses
         WHERE lat BETWEEN ? AND ? AND lon BETWEEN ? AND ?",
    );
    if subcategory.is_some() {
        sql.push_str(" AND subcategory = ?");
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    stmt.raw_bind_parameter(1, min_lat - margin)?;
    stmt.raw_bind_parameter(2, max_lat + margin)?;
    stmt.raw_bind_parameter(3, min_lon - margin)?;
    stmt.raw_bind_parameter(4, max_lon + margin)?;
    if let Some(subcategory) = subcategory {
        stmt.raw_bind_parameter(5, subcategory)?;
    }
    stmt.raw_execute()?;

    let mut businesses = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let location = LatLon::new(row.get(3)?, row.get(4)?);
        if !within_margin(boundary, location, margin) {
            continue;
        }
        businesses.push(BusinessRecord {
            name: row.get(0)?,
            category: row.get(1)?,
            subcategory: row.get(2)?,
            location,
            rating: row.get(5)?,
        });
    }

    Ok(businesses)
}

/// Distinct `(category, subcategory)` pairs among `businesses`, sorted.
#[must_use]
pub fn distinct_subcategories(businesses: &[BusinessRecord]) -> Vec<SubcategoryRef> {
    let mut refs: Vec<SubcategoryRef> = businesses
        .iter()
        .map(|b| SubcategoryRef {
            category: b.category.clone(),
            subcategory: b.subcategory.clone(),
        })
        .collect();
    refs.sort();
    refs.dedup();
    refs
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;
    use crate::db::open_in_memory;

    const CSV: &str = "name,category,subcategory,lat,lon,rating
Corner Cafe,Food,Cafe,0.5,0.5,4.5
,Food,Cafe,0.5,1.005,
Far Cafe,Food,Cafe,0.5,3.0,
Daily Bread,Food,Bakery,0.2,0.2,3.0
";

    fn square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
    }

    #[test]
    fn csv_rows_parse_optional_fields() {
        let records = read_csv(CSV.as_bytes()).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].rating, Some(4.5));
        assert_eq!(records[1].name, None);
        assert_eq!(records[1].rating, None);
        assert_eq!(records[3].subcategory, "Bakery");
    }

    #[test]
    fn margin_filter_is_exact() {
        let conn = open_in_memory().unwrap();
        assert_eq!(import_csv(&conn, CSV.as_bytes()).unwrap(), 4);

        let bounds = [0.0, 0.0, 1.0, 1.0];
        let cafes = businesses_near(&conn, &square(), bounds, Some("Cafe"), 0.01).unwrap();
        assert_eq!(cafes.len(), 2);
        assert_eq!(cafes[0].name.as_deref(), Some("Corner Cafe"));

        let inside = businesses_near(&conn, &square(), bounds, Some("Cafe"), 0.0).unwrap();
        assert_eq!(inside.len(), 1);

        let all = businesses_near(&conn, &square(), bounds, None, 0.01).unwrap();
        let subs = distinct_subcategories(&all);
        let names: Vec<&str> = subs.iter().map(|s| s.subcategory.as_str()).collect();
        assert_eq!(names, vec!["Bakery", "Cafe"]);
    }
}
