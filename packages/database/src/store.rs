//! [`DuckDbStore`]: the `DuckDB`-backed implementation of the density
//! collaborator traits.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use duckdb::Connection;
use site_scout_density::{ArtifactStore, BusinessSource, RegionGeometry, RegionSource, StoreError};
use site_scout_density_models::{ArtifactKey, DensityArtifact, NewArtifact};
use site_scout_geography_models::{LatLon, SubcategoryRef};

use crate::{DbError, artifact_db, business_db, db, regions_db};

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        Self::Backend {
            message: e.to_string(),
        }
    }
}

/// A single `DuckDB` connection shared behind a mutex.
pub struct DuckDbStore {
    conn: Mutex<Connection>,
}

impl DuckDbStore {
    /// Opens (or creates) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Ok(Self::from_connection(db::open(path)?))
    }

    /// An in-memory database, for tests and dry runs.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the connection or schema creation fails.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Ok(Self::from_connection(db::open_in_memory()?))
    }

    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|e| DbError::Conversion {
            message: format!("database connection lock poisoned: {e}"),
        })
    }

    /// Runs `f` with exclusive access to the connection.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns, or [`DbError`] if the lock is
    /// poisoned.
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut conn = self.lock()?;
        f(&mut conn)
    }

    fn region_boundary(
        conn: &Connection,
        region_id: i64,
    ) -> Result<(geo::Polygon<f64>, [f64; 4]), StoreError> {
        let not_found = || StoreError::NotFound {
            what: format!("region {region_id}"),
        };
        let boundary = regions_db::get_boundary(conn, region_id)?.ok_or_else(not_found)?;
        let bounds = regions_db::region_bounds(conn, region_id)?.ok_or_else(not_found)?;
        Ok((boundary, bounds))
    }
}

impl RegionSource for DuckDbStore {
    fn region_geometry(&self, region_id: i64) -> Result<RegionGeometry, StoreError> {
        let conn = self.lock()?;
        regions_db::region_geometry(&conn, region_id)?.ok_or_else(|| StoreError::NotFound {
            what: format!("region {region_id}"),
        })
    }
}

impl BusinessSource for DuckDbStore {
    fn locations(
        &self,
        region_id: i64,
        subcategory: &str,
        margin: f64,
    ) -> Result<Vec<LatLon>, StoreError> {
        let conn = self.lock()?;
        let (boundary, bounds) = Self::region_boundary(&conn, region_id)?;
        let businesses =
            business_db::businesses_near(&conn, &boundary, bounds, Some(subcategory), margin)?;
        Ok(businesses.into_iter().map(|b| b.location).collect())
    }

    fn subcategories(&self, region_id: i64, margin: f64) -> Result<Vec<SubcategoryRef>, StoreError> {
        let conn = self.lock()?;
        let (boundary, bounds) = Self::region_boundary(&conn, region_id)?;
        let businesses = business_db::businesses_near(&conn, &boundary, bounds, None, margin)?;
        Ok(business_db::distinct_subcategories(&businesses))
    }
}

impl ArtifactStore for DuckDbStore {
    fn put(&self, artifact: NewArtifact) -> Result<DensityArtifact, StoreError> {
        artifact.validate()?;
        let mut conn = self.lock()?;
        Ok(artifact_db::insert_artifact(&mut conn, artifact)?)
    }

    fn get(&self, id: i64) -> Result<Option<DensityArtifact>, StoreError> {
        Ok(artifact_db::get_artifact(&*self.lock()?, id)?)
    }

    fn get_latest(
        &self,
        region_id: i64,
        subcategory: &str,
        percentile: f64,
    ) -> Result<Option<DensityArtifact>, StoreError> {
        Ok(artifact_db::latest(&*self.lock()?, region_id, subcategory, percentile)?)
    }

    fn get_latest_for_key(&self, key: &ArtifactKey) -> Result<Option<DensityArtifact>, StoreError> {
        Ok(artifact_db::latest_for_key(&*self.lock()?, key)?)
    }

    fn get_all_for_region(&self, region_id: i64) -> Result<Vec<DensityArtifact>, StoreError> {
        Ok(artifact_db::for_region(&*self.lock()?, region_id)?)
    }

    fn canonical_for_region(&self, region_id: i64) -> Result<Vec<DensityArtifact>, StoreError> {
        Ok(artifact_db::canonical_for_region(&*self.lock()?, region_id)?)
    }
}
