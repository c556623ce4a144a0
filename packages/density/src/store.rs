//! Collaborator traits for region geometry, business locations, and
//! artifact persistence, plus an in-memory implementation of all three.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use geo::Polygon;
use site_scout_density_models::{
    ArtifactKey, DensityArtifact, InvalidArtifactError, NewArtifact,
};
use site_scout_geography_models::{BusinessRecord, LatLon, SubcategoryRef};
use site_scout_spatial::region::within_margin;
use site_scout_spatial::{GeoRegion, SpatialError};
use thiserror::Error;

/// Errors reported by a collaborator store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("Not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// The backend failed (I/O, SQL, serialization).
    #[error("Store backend error: {message}")]
    Backend {
        /// Backend error text.
        message: String,
    },

    /// An artifact was rejected before being written.
    #[error(transparent)]
    InvalidArtifact(#[from] InvalidArtifactError),
}

/// A district boundary and the exclusion polygons that touch it.
#[derive(Debug, Clone)]
pub struct RegionGeometry {
    pub boundary: Polygon<f64>,
    pub exclusions: Vec<Polygon<f64>>,
}

impl RegionGeometry {
    /// Builds the validated [`GeoRegion`] used for masking.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if the boundary is not a
    /// usable polygon.
    pub fn to_region(&self) -> Result<GeoRegion, SpatialError> {
        Ok(GeoRegion::new(self.boundary.clone())?.with_exclusions(self.exclusions.iter().cloned()))
    }
}

/// Source of district geometry.
pub trait RegionSource: Send + Sync {
    /// Boundary and exclusions of one district.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown id.
    fn region_geometry(&self, region_id: i64) -> Result<RegionGeometry, StoreError>;
}

/// Source of existing business locations.
pub trait BusinessSource: Send + Sync {
    /// Locations of every business in `subcategory` within `margin`
    /// degrees of the district, in store order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the district or the backend is
    /// unavailable.
    fn locations(
        &self,
        region_id: i64,
        subcategory: &str,
        margin: f64,
    ) -> Result<Vec<LatLon>, StoreError>;

    /// Distinct `(category, subcategory)` pairs within `margin` degrees of
    /// the district, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the district or the backend is
    /// unavailable.
    fn subcategories(&self, region_id: i64, margin: f64) -> Result<Vec<SubcategoryRef>, StoreError>;
}

/// Persistence for density artifacts. Writes are whole-artifact atomic and
/// ids increase monotonically.
pub trait ArtifactStore: Send + Sync {
    /// Validates and stores `artifact`, returning it with its new id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArtifact`] if the artifact breaks its
    /// invariants, or [`StoreError::Backend`] on write failure.
    fn put(&self, artifact: NewArtifact) -> Result<DensityArtifact, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on read failure.
    fn get(&self, id: i64) -> Result<Option<DensityArtifact>, StoreError>;

    /// The most recent artifact for a subcategory at `percentile`, any
    /// buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on read failure.
    fn get_latest(
        &self,
        region_id: i64,
        subcategory: &str,
        percentile: f64,
    ) -> Result<Option<DensityArtifact>, StoreError>;

    /// The most recent artifact with exactly this key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on read failure.
    fn get_latest_for_key(&self, key: &ArtifactKey) -> Result<Option<DensityArtifact>, StoreError>;

    /// Every artifact of a district, ascending id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on read failure.
    fn get_all_for_region(&self, region_id: i64) -> Result<Vec<DensityArtifact>, StoreError>;

    /// The latest canonical artifact of each subcategory in a district,
    /// ascending id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] on read failure.
    fn canonical_for_region(&self, region_id: i64) -> Result<Vec<DensityArtifact>, StoreError> {
        Ok(latest_canonical(self.get_all_for_region(region_id)?))
    }
}

/// Keeps the highest-id canonical artifact per subcategory.
#[must_use]
pub fn latest_canonical(artifacts: Vec<DensityArtifact>) -> Vec<DensityArtifact> {
    let mut latest: BTreeMap<String, DensityArtifact> = BTreeMap::new();
    for artifact in artifacts.into_iter().filter(DensityArtifact::is_canonical) {
        match latest.get(&artifact.subcategory) {
            Some(existing) if existing.id >= artifact.id => {}
            _ => {
                latest.insert(artifact.subcategory.clone(), artifact);
            }
        }
    }

    let mut result: Vec<DensityArtifact> = latest.into_values().collect();
    result.sort_by_key(|a| a.id);
    result
}

#[derive(Default)]
struct MemoryState {
    regions: BTreeMap<i64, RegionGeometry>,
    businesses: Vec<BusinessRecord>,
    artifacts: Vec<DensityArtifact>,
    next_artifact_id: i64,
}

/// A process-local store for tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|e| StoreError::Backend {
            message: format!("memory store lock poisoned: {e}"),
        })
    }

    /// Registers a district.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store lock is poisoned.
    pub fn insert_region(&self, region_id: i64, geometry: RegionGeometry) -> Result<(), StoreError> {
        self.lock()?.regions.insert(region_id, geometry);
        Ok(())
    }

    /// Adds existing businesses.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store lock is poisoned.
    pub fn insert_businesses(
        &self,
        businesses: impl IntoIterator<Item = BusinessRecord>,
    ) -> Result<(), StoreError> {
        self.lock()?.businesses.extend(businesses);
        Ok(())
    }

    /// Number of stored artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the store lock is poisoned.
    pub fn artifact_count(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.artifacts.len())
    }
}

fn boundary_of(state: &MemoryState, region_id: i64) -> Result<Polygon<f64>, StoreError> {
    state
        .regions
        .get(&region_id)
        .map(|g| g.boundary.clone())
        .ok_or_else(|| StoreError::NotFound {
            what: format!("region {region_id}"),
        })
}

impl RegionSource for MemoryStore {
    fn region_geometry(&self, region_id: i64) -> Result<RegionGeometry, StoreError> {
        self.lock()?
            .regions
            .get(&region_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                what: format!("region {region_id}"),
            })
    }
}

impl BusinessSource for MemoryStore {
    fn locations(
        &self,
        region_id: i64,
        subcategory: &str,
        margin: f64,
    ) -> Result<Vec<LatLon>, StoreError> {
        let state = self.lock()?;
        let boundary = boundary_of(&state, region_id)?;

        Ok(state
            .businesses
            .iter()
            .filter(|b| b.subcategory == subcategory)
            .filter(|b| within_margin(&boundary, b.location, margin))
            .map(|b| b.location)
            .collect())
    }

    fn subcategories(&self, region_id: i64, margin: f64) -> Result<Vec<SubcategoryRef>, StoreError> {
        let state = self.lock()?;
        let boundary = boundary_of(&state, region_id)?;

        let mut refs: Vec<SubcategoryRef> = state
            .businesses
            .iter()
            .filter(|b| within_margin(&boundary, b.location, margin))
            .map(|b| SubcategoryRef {
                category: b.category.clone(),
                subcategory: b.subcategory.clone(),
            })
            .collect();
        refs.sort();
        refs.dedup();
        Ok(refs)
    }
}

impl ArtifactStore for MemoryStore {
    fn put(&self, artifact: NewArtifact) -> Result<DensityArtifact, StoreError> {
        artifact.validate()?;

        let mut state = self.lock()?;
        state.next_artifact_id += 1;
        let stored = DensityArtifact::from_new(state.next_artifact_id, Utc::now(), artifact);
        state.artifacts.push(stored.clone());
        Ok(stored)
    }

    fn get(&self, id: i64) -> Result<Option<DensityArtifact>, StoreError> {
        Ok(self.lock()?.artifacts.iter().find(|a| a.id == id).cloned())
    }

    #[allow(clippy::float_cmp)]
    fn get_latest(
        &self,
        region_id: i64,
        subcategory: &str,
        percentile: f64,
    ) -> Result<Option<DensityArtifact>, StoreError> {
        Ok(self
            .lock()?
            .artifacts
            .iter()
            .filter(|a| {
                a.region_id == region_id && a.subcategory == subcategory && a.percentile == percentile
            })
            .max_by_key(|a| a.id)
            .cloned())
    }

    fn get_latest_for_key(&self, key: &ArtifactKey) -> Result<Option<DensityArtifact>, StoreError> {
        Ok(self
            .lock()?
            .artifacts
            .iter()
            .filter(|a| a.matches_key(key))
            .max_by_key(|a| a.id)
            .cloned())
    }

    fn get_all_for_region(&self, region_id: i64) -> Result<Vec<DensityArtifact>, StoreError> {
        Ok(self
            .lock()?
            .artifacts
            .iter()
            .filter(|a| a.region_id == region_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn square() -> RegionGeometry {
        RegionGeometry {
            boundary: polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
                (x: 0.0, y: 0.0),
            ],
            exclusions: Vec::new(),
        }
    }

    fn business(subcategory: &str, lat: f64, lon: f64) -> BusinessRecord {
        BusinessRecord {
            name: None,
            category: "Food".to_string(),
            subcategory: subcategory.to_string(),
            location: LatLon::new(lat, lon),
            rating: None,
        }
    }

    fn new_artifact(subcategory: &str, percentile: f64) -> NewArtifact {
        NewArtifact {
            region_id: 1,
            category: Some("Food".to_string()),
            subcategory: subcategory.to_string(),
            buffer_distance: 0.005,
            percentile,
            points: vec![LatLon::new(0.5, 0.5)],
            weights: vec![1.0],
        }
    }

    #[test]
    fn locations_respect_margin_and_subcategory() {
        let store = MemoryStore::new();
        store.insert_region(1, square()).unwrap();
        store
            .insert_businesses([
                business("Cafe", 0.5, 0.5),
                business("Cafe", 0.5, 1.005),
                business("Cafe", 0.5, 1.5),
                business("Bakery", 0.2, 0.2),
            ])
            .unwrap();

        assert_eq!(store.locations(1, "Cafe", 0.01).unwrap().len(), 2);
        assert_eq!(store.locations(1, "Cafe", 0.0).unwrap().len(), 1);
        assert!(matches!(
            store.locations(2, "Cafe", 0.01),
            Err(StoreError::NotFound { .. })
        ));

        let subs = store.subcategories(1, 0.01).unwrap();
        let names: Vec<&str> = subs.iter().map(|s| s.subcategory.as_str()).collect();
        assert_eq!(names, vec!["Bakery", "Cafe"]);
    }

    #[test]
    fn put_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.put(new_artifact("Cafe", 100.0)).unwrap();
        let b = store.put(new_artifact("Cafe", 100.0)).unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.get_latest(1, "Cafe", 100.0).unwrap().unwrap().id, b.id);
        assert_eq!(store.get_latest_for_key(&a.key()).unwrap().unwrap().id, b.id);
        assert!(store.get_latest(1, "Cafe", 50.0).unwrap().is_none());
    }

    #[test]
    fn invalid_artifacts_are_not_written() {
        let store = MemoryStore::new();
        let mut bad = new_artifact("Cafe", 100.0);
        bad.weights.push(0.5);
        assert!(matches!(store.put(bad), Err(StoreError::InvalidArtifact(_))));
        assert_eq!(store.artifact_count().unwrap(), 0);
    }

    #[test]
    fn canonical_keeps_latest_full_percentile_per_subcategory() {
        let store = MemoryStore::new();
        store.put(new_artifact("Cafe", 100.0)).unwrap();
        let latest_cafe = store.put(new_artifact("Cafe", 100.0)).unwrap();
        store.put(new_artifact("Cafe", 50.0)).unwrap();
        let bakery = store.put(new_artifact("Bakery", 100.0)).unwrap();

        let canonical = store.canonical_for_region(1).unwrap();
        let ids: Vec<i64> = canonical.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![latest_cafe.id, bakery.id]);
        assert_eq!(store.get_all_for_region(1).unwrap().len(), 4);
    }
}
