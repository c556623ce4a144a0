//! Generation runs: mask, fit, filter, persist, and cluster one
//! `(region, subcategory)` selection.
//!
//! [`Generator::run`] never returns an error. Every failure is folded into
//! a [`RunOutcome`] with a [`RunStatus`] and a message, and nothing is
//! persisted unless the run succeeds.

use std::sync::Arc;

use site_scout_density_models::{
    ArtifactKey, CANONICAL_PERCENTILE, DensityArtifact, LocalMaximum, NewArtifact,
    RankedSubcategory, RunOutcome, RunStatus,
};
use site_scout_geography_models::LatLon;
use site_scout_spatial::build_mask;

use crate::candidates::filter_candidates;
use crate::cluster::reduce_to_local_maxima;
use crate::estimator::fit_and_score;
use crate::progress::{ProgressCallback, null_progress};
use crate::ranker::rank;
use crate::store::{ArtifactStore, BusinessSource, RegionSource};
use crate::{DensityError, PipelineConfig};

/// One generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub region_id: i64,
    pub category: Option<String>,
    pub subcategory: String,
    /// Minimum distance from existing businesses, in degrees.
    pub buffer_distance: f64,
    /// Low-density threshold percentile (0-100).
    pub percentile: f64,
}

impl GenerationRequest {
    /// A request using the buffer and percentile from `config`.
    #[must_use]
    pub fn from_config(
        config: &PipelineConfig,
        region_id: i64,
        category: Option<String>,
        subcategory: impl Into<String>,
    ) -> Self {
        Self {
            region_id,
            category,
            subcategory: subcategory.into(),
            buffer_distance: config.buffer_distance(),
            percentile: config.percentile,
        }
    }

    /// The artifact identity this request would produce.
    #[must_use]
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            region_id: self.region_id,
            subcategory: self.subcategory.clone(),
            percentile: self.percentile,
            buffer_distance: self.buffer_distance,
        }
    }
}

/// Runs the opportunity pipeline against a set of collaborators.
pub struct Generator {
    regions: Arc<dyn RegionSource>,
    businesses: Arc<dyn BusinessSource>,
    artifacts: Arc<dyn ArtifactStore>,
    config: PipelineConfig,
    progress: Arc<dyn ProgressCallback>,
}

impl Generator {
    #[must_use]
    pub fn new(
        regions: Arc<dyn RegionSource>,
        businesses: Arc<dyn BusinessSource>,
        artifacts: Arc<dyn ArtifactStore>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            regions,
            businesses,
            artifacts,
            config,
            progress: null_progress(),
        }
    }

    /// Reports checkpoints to `progress` instead of discarding them.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs one generation and reports its terminal status.
    pub fn run(&self, request: &GenerationRequest) -> RunOutcome {
        self.progress.set_total(100);
        self.progress.set_position(0);
        self.progress
            .set_message(format!("Generating {} map", request.subcategory));

        let outcome = match self.try_run(request) {
            Ok(outcome) => outcome,
            Err(e) => {
                let status = status_for(&e);
                if status == RunStatus::Failed {
                    log::error!("Generation for {} failed: {e}", request.subcategory);
                } else {
                    log::warn!("Generation for {}: {e}", request.subcategory);
                }
                RunOutcome::failure(status, e.to_string())
            }
        };

        self.progress.finish(outcome.message.clone());
        outcome
    }

    fn try_run(&self, request: &GenerationRequest) -> Result<RunOutcome, DensityError> {
        self.config.validate()?;

        if self.config.reuse_existing {
            if let Some(existing) = self.artifacts.get_latest_for_key(&request.key())? {
                log::info!(
                    "Reusing artifact {} for {} in region {}",
                    existing.id,
                    request.subcategory,
                    request.region_id
                );
                let local_maxima = local_maxima_for(&existing, &self.config)?;
                self.progress.set_position(100);
                return Ok(RunOutcome {
                    status: RunStatus::Reused,
                    message: format!(
                        "Reused artifact {} with {} candidates",
                        existing.id,
                        existing.points.len()
                    ),
                    artifact_id: Some(existing.id),
                    business_count: 0,
                    candidate_count: existing.points.len(),
                    local_maxima,
                });
            }
        }

        let geometry = self.regions.region_geometry(request.region_id)?;
        let business_coords = self.businesses.locations(
            request.region_id,
            &request.subcategory,
            self.config.region_margin,
        )?;
        if business_coords.is_empty() {
            return Err(DensityError::InsufficientData {
                message: format!(
                    "no {} businesses in or near region {}",
                    request.subcategory, request.region_id
                ),
            });
        }
        self.progress.set_position(30);
        log::debug!(
            "Loaded {} {} businesses for region {}",
            business_coords.len(),
            request.subcategory,
            request.region_id
        );

        let region = geometry.to_region()?;
        let grid = build_mask(&region, self.config.grid_step)?;
        let grid_points = grid.valid_points();
        let density = fit_and_score(&business_coords, &grid_points)?;
        self.progress.set_position(65);

        let candidates = filter_candidates(
            &density,
            &grid_points,
            &business_coords,
            request.percentile,
            request.buffer_distance,
        )?;
        self.progress.set_position(80);

        let stored = self.artifacts.put(NewArtifact {
            region_id: request.region_id,
            category: request.category.clone(),
            subcategory: request.subcategory.clone(),
            buffer_distance: request.buffer_distance,
            percentile: request.percentile,
            points: candidates.points,
            weights: candidates.weights,
        })?;
        self.progress.set_position(90);

        let local_maxima = local_maxima_for(&stored, &self.config)?;
        self.progress.set_position(100);

        log::info!(
            "Stored artifact {} for {}: {} of {} cells are candidates, {} suggested sites",
            stored.id,
            request.subcategory,
            stored.points.len(),
            grid_points.len(),
            local_maxima.len()
        );

        Ok(RunOutcome {
            status: RunStatus::Success,
            message: format!(
                "Found {} candidate sites ({} suggestions)",
                stored.points.len(),
                local_maxima.len()
            ),
            artifact_id: Some(stored.id),
            business_count: business_coords.len(),
            candidate_count: stored.points.len(),
            local_maxima,
        })
    }

    /// Generates canonical maps for every subcategory present near a
    /// region. Each run is independent; a failing subcategory does not stop
    /// the rest.
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::Store`] if the subcategory list cannot be
    /// read.
    pub fn run_all(&self, region_id: i64) -> Result<Vec<(GenerationRequest, RunOutcome)>, DensityError> {
        let subcategories = self
            .businesses
            .subcategories(region_id, self.config.region_margin)?;
        log::info!(
            "Generating {} subcategory maps for region {region_id}",
            subcategories.len()
        );

        Ok(subcategories
            .into_iter()
            .map(|sub| {
                let request = GenerationRequest {
                    region_id,
                    category: Some(sub.category),
                    subcategory: sub.subcategory,
                    buffer_distance: self.config.buffer_distance(),
                    percentile: CANONICAL_PERCENTILE,
                };
                let outcome = self.run(&request);
                (request, outcome)
            })
            .collect())
    }
}

/// Maps a pipeline error to the status a caller reports.
#[must_use]
pub const fn status_for(error: &DensityError) -> RunStatus {
    match error {
        DensityError::InsufficientData { .. } => RunStatus::NoData,
        DensityError::EmptyRegion { .. } => RunStatus::EmptyRegion,
        DensityError::NoCandidates { .. } => RunStatus::NoCandidates,
        DensityError::InvalidParameter { .. }
        | DensityError::Config { .. }
        | DensityError::Spatial(_)
        | DensityError::Artifact(_)
        | DensityError::Store(_) => RunStatus::Failed,
    }
}

/// Local maxima of a stored artifact, highest weight first.
///
/// # Errors
///
/// Returns [`DensityError::InvalidParameter`] if the artifact's arrays are
/// mismatched or the cluster settings are invalid.
pub fn local_maxima_for(
    artifact: &DensityArtifact,
    config: &PipelineConfig,
) -> Result<Vec<LocalMaximum>, DensityError> {
    let mut maxima = reduce_to_local_maxima(
        &artifact.points,
        &artifact.weights,
        config.cluster_eps,
        config.cluster_min_samples,
    )?;
    maxima.sort_by(|a, b| b.weight.total_cmp(&a.weight));
    Ok(maxima)
}

/// Ranks every subcategory with a canonical artifact in `region_id` at
/// `query`.
///
/// # Errors
///
/// Returns [`DensityError::Store`] if the artifacts cannot be read.
pub fn suggest_subcategories(
    artifacts: &dyn ArtifactStore,
    region_id: i64,
    query: LatLon,
    proximity_threshold: f64,
) -> Result<Vec<RankedSubcategory>, DensityError> {
    let canonical = artifacts.canonical_for_region(region_id)?;
    log::debug!(
        "Ranking {} canonical artifacts at ({}, {})",
        canonical.len(),
        query.lat,
        query.lon
    );
    Ok(rank(query, &canonical, proximity_threshold))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use geo::polygon;
    use site_scout_geography_models::BusinessRecord;

    use super::*;
    use crate::MemoryStore;
    use crate::store::RegionGeometry;

    #[derive(Default)]
    struct RecordingProgress {
        positions: Mutex<Vec<u64>>,
        finished: Mutex<Option<String>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn set_total(&self, _total: u64) {}
        fn set_position(&self, pos: u64) {
            self.positions.lock().unwrap().push(pos);
        }
        fn inc(&self, _delta: u64) {}
        fn set_message(&self, _msg: String) {}
        fn finish(&self, msg: String) {
            *self.finished.lock().unwrap() = Some(msg);
        }
        fn finish_and_clear(&self) {}
    }

    fn store_with_square() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_region(
                1,
                RegionGeometry {
                    boundary: polygon![
                        (x: 0.0, y: 0.0),
                        (x: 1.0, y: 0.0),
                        (x: 1.0, y: 1.0),
                        (x: 0.0, y: 1.0),
                        (x: 0.0, y: 0.0),
                    ],
                    exclusions: Vec::new(),
                },
            )
            .unwrap();
        store
            .insert_businesses([BusinessRecord {
                name: Some("Corner Cafe".to_string()),
                category: "Food".to_string(),
                subcategory: "Cafe".to_string(),
                location: LatLon::new(0.1, 0.1),
                rating: None,
            }])
            .unwrap();
        store
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            grid_step: 0.1,
            buffer_meters: 5_000.0,
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn reports_checkpoints_in_order() {
        let store = store_with_square();
        let progress = Arc::new(RecordingProgress::default());
        let generator = Generator::new(store.clone(), store.clone(), store, config())
            .with_progress(progress.clone());

        let outcome = generator.run(&GenerationRequest::from_config(
            generator.config(),
            1,
            Some("Food".to_string()),
            "Cafe",
        ));

        assert_eq!(outcome.status, RunStatus::Success);
        assert_eq!(*progress.positions.lock().unwrap(), vec![0, 30, 65, 80, 90, 100]);
        assert_eq!(progress.finished.lock().unwrap().as_deref(), Some(outcome.message.as_str()));
    }

    #[test]
    fn unknown_region_fails_without_artifact() {
        let store = store_with_square();
        let generator = Generator::new(store.clone(), store.clone(), store.clone(), config());
        let outcome = generator.run(&GenerationRequest::from_config(generator.config(), 9, None, "Cafe"));
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(store.artifact_count().unwrap(), 0);
    }

    #[test]
    fn status_mapping_matches_error_kind() {
        assert_eq!(
            status_for(&DensityError::NoCandidates {
                message: String::new()
            }),
            RunStatus::NoCandidates
        );
        assert_eq!(
            status_for(&DensityError::InsufficientData {
                message: String::new()
            }),
            RunStatus::NoData
        );
    }
}
