//! Density artifact persistence.
//!
//! Each artifact is one row: the candidate points as a `GeoJSON`
//! `MultiPoint` and the weights as a JSON array in the same order. Rows are
//! written inside a transaction so a reader never sees half an artifact.

use chrono::{DateTime, Utc};
use duckdb::{Connection, Row};
use site_scout_density_models::{ArtifactKey, CANONICAL_PERCENTILE, DensityArtifact, NewArtifact};
use site_scout_spatial::geojson_io::{points_from_multipoint, points_to_multipoint};

use crate::DbError;

const SELECT_COLUMNS: &str = "SELECT id, region_id, category, subcategory, buffer_distance, \
     percentile, points_geojson, weights_json, created_at FROM artifacts";

/// Validates and inserts an artifact, returning it with its assigned id.
///
/// # Errors
///
/// Returns [`DbError::Conversion`] if the artifact is invalid, or
/// [`DbError::Database`] if the write fails (nothing is committed).
pub fn insert_artifact(conn: &mut Connection, artifact: NewArtifact) -> Result<DensityArtifact, DbError> {
    artifact.validate().map_err(|e| DbError::Conversion {
        message: e.to_string(),
    })?;

    let created_at = Utc::now();
    let points_geojson = points_to_multipoint(&artifact.points);
    let weights_json = serde_json::to_string(&artifact.weights)?;

    let tx = conn.transaction()?;
    let id: i64 = tx.query_row(
        "INSERT INTO artifacts (
            id, region_id, category, subcategory, buffer_distance, percentile,
            points_geojson, weights_json, created_at
        ) VALUES (nextval('artifacts_id_seq'), ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id",
        duckdb::params![
            artifact.region_id,
            artifact.category.as_deref(),
            &artifact.subcategory,
            artifact.buffer_distance,
            artifact.percentile,
            points_geojson,
            weights_json,
            created_at.to_rfc3339(),
        ],
        |row| row.get(0),
    )?;
    tx.commit()?;

    log::debug!(
        "Stored artifact {id}: {} points for {} in region {}",
        artifact.points.len(),
        artifact.subcategory,
        artifact.region_id
    );

    Ok(DensityArtifact::from_new(id, created_at, artifact))
}

fn artifact_from_row(row: &Row<'_>) -> Result<DensityArtifact, DbError> {
    let id: i64 = row.get(0)?;
    let points_geojson: String = row.get(6)?;
    let weights_json: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| DbError::Conversion {
            message: format!("artifact {id} has bad created_at {created_at:?}: {e}"),
        })?
        .with_timezone(&Utc);

    Ok(DensityArtifact {
        id,
        created_at,
        region_id: row.get(1)?,
        category: row.get(2)?,
        subcategory: row.get(3)?,
        buffer_distance: row.get(4)?,
        percentile: row.get(5)?,
        points: points_from_multipoint(&points_geojson)?,
        weights: serde_json::from_str(&weights_json)?,
    })
}

fn query_artifacts(
    conn: &Connection,
    filter: &str,
    bind: impl FnOnce(&mut duckdb::Statement<'_>) -> Result<(), duckdb::Error>,
) -> Result<Vec<DensityArtifact>, DbError> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {filter}"))?;
    bind(&mut stmt)?;
    stmt.raw_execute()?;

    let mut artifacts = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        artifacts.push(artifact_from_row(row)?);
    }

    Ok(artifacts)
}

/// Looks up one artifact by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row is malformed.
pub fn get_artifact(conn: &Connection, id: i64) -> Result<Option<DensityArtifact>, DbError> {
    Ok(query_artifacts(conn, "WHERE id = ?", |stmt| stmt.raw_bind_parameter(1, id))?
        .into_iter()
        .next())
}

/// The highest-id artifact for a subcategory at `percentile`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row is malformed.
pub fn latest(
    conn: &Connection,
    region_id: i64,
    subcategory: &str,
    percentile: f64,
) -> Result<Option<DensityArtifact>, DbError> {
    Ok(query_artifacts(
        conn,
        "WHERE region_id = ? AND subcategory = ? AND percentile = ? ORDER BY id DESC LIMIT 1",
        |stmt| {
            stmt.raw_bind_parameter(1, region_id)?;
            stmt.raw_bind_parameter(2, subcategory)?;
            stmt.raw_bind_parameter(3, percentile)
        },
    )?
    .into_iter()
    .next())
}

/// The highest-id artifact with exactly this key.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or the row is malformed.
pub fn latest_for_key(conn: &Connection, key: &ArtifactKey) -> Result<Option<DensityArtifact>, DbError> {
    Ok(query_artifacts(
        conn,
        "WHERE region_id = ? AND subcategory = ? AND percentile = ? AND buffer_distance = ?
         ORDER BY id DESC LIMIT 1",
        |stmt| {
            stmt.raw_bind_parameter(1, key.region_id)?;
            stmt.raw_bind_parameter(2, &key.subcategory)?;
            stmt.raw_bind_parameter(3, key.percentile)?;
            stmt.raw_bind_parameter(4, key.buffer_distance)
        },
    )?
    .into_iter()
    .next())
}

/// Every artifact of a district, ascending id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row is malformed.
pub fn for_region(conn: &Connection, region_id: i64) -> Result<Vec<DensityArtifact>, DbError> {
    query_artifacts(conn, "WHERE region_id = ? ORDER BY id", |stmt| {
        stmt.raw_bind_parameter(1, region_id)
    })
}

/// The latest canonical artifact of each subcategory in a district,
/// ascending id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row is malformed.
pub fn canonical_for_region(conn: &Connection, region_id: i64) -> Result<Vec<DensityArtifact>, DbError> {
    query_artifacts(
        conn,
        "WHERE id IN (
            SELECT MAX(id) FROM artifacts
            WHERE region_id = ? AND percentile = ?
            GROUP BY subcategory
        )
        ORDER BY id",
        |stmt| {
            stmt.raw_bind_parameter(1, region_id)?;
            stmt.raw_bind_parameter(2, CANONICAL_PERCENTILE)
        },
    )
}

#[cfg(test)]
mod tests {
    use site_scout_geography_models::LatLon;

    use super::*;
    use crate::db::open_in_memory;

    fn new_artifact(subcategory: &str, percentile: f64, buffer_distance: f64) -> NewArtifact {
        NewArtifact {
            region_id: 1,
            category: Some("Food".to_string()),
            subcategory: subcategory.to_string(),
            buffer_distance,
            percentile,
            points: vec![LatLon::new(35.7, 51.4), LatLon::new(35.701, 51.402)],
            weights: vec![0.25, 1.0],
        }
    }

    #[test]
    fn stored_artifact_reads_back_identically() {
        let mut conn = open_in_memory().unwrap();
        let stored = insert_artifact(&mut conn, new_artifact("Cafe", 100.0, 0.005)).unwrap();

        let loaded = get_artifact(&conn, stored.id).unwrap().unwrap();
        assert_eq!(loaded.points, stored.points);
        assert_eq!(loaded.weights, stored.weights);
        assert_eq!(loaded.key(), stored.key());
        assert_eq!(loaded.created_at.timestamp(), stored.created_at.timestamp());
        assert!(get_artifact(&conn, stored.id + 1).unwrap().is_none());
    }

    #[test]
    fn invalid_artifact_is_not_written() {
        let mut conn = open_in_memory().unwrap();
        let mut bad = new_artifact("Cafe", 100.0, 0.005);
        bad.weights.pop();
        assert!(matches!(
            insert_artifact(&mut conn, bad),
            Err(DbError::Conversion { .. })
        ));
        assert!(for_region(&conn, 1).unwrap().is_empty());
    }

    #[test]
    fn latest_lookups_prefer_higher_ids() {
        let mut conn = open_in_memory().unwrap();
        let a = insert_artifact(&mut conn, new_artifact("Cafe", 100.0, 0.005)).unwrap();
        let b = insert_artifact(&mut conn, new_artifact("Cafe", 100.0, 0.01)).unwrap();
        insert_artifact(&mut conn, new_artifact("Cafe", 40.0, 0.005)).unwrap();

        assert_eq!(latest(&conn, 1, "Cafe", 100.0).unwrap().unwrap().id, b.id);
        assert_eq!(latest_for_key(&conn, &a.key()).unwrap().unwrap().id, a.id);
        assert!(latest(&conn, 2, "Cafe", 100.0).unwrap().is_none());
    }

    #[test]
    fn canonical_set_has_one_artifact_per_subcategory() {
        let mut conn = open_in_memory().unwrap();
        insert_artifact(&mut conn, new_artifact("Cafe", 100.0, 0.005)).unwrap();
        let bakery = insert_artifact(&mut conn, new_artifact("Bakery", 100.0, 0.005)).unwrap();
        let cafe = insert_artifact(&mut conn, new_artifact("Cafe", 100.0, 0.005)).unwrap();
        insert_artifact(&mut conn, new_artifact("Gym", 50.0, 0.005)).unwrap();

        let ids: Vec<i64> = canonical_for_region(&conn, 1)
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![bakery.id, cafe.id]);
        assert_eq!(for_region(&conn, 1).unwrap().len(), 4);
    }
}
