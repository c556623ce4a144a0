#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Opportunity maps for new business locations.
//!
//! Fits a haversine Gaussian kernel density estimate to the existing
//! businesses of one subcategory, evaluates it on a masked lattice over the
//! district, keeps low-density cells that are far enough from every
//! existing business, and scores them so that lower competing density
//! means a higher opportunity weight. The scored point cloud is persisted
//! as a [`DensityArtifact`](site_scout_density_models::DensityArtifact),
//! reduced to per-cluster local maxima for display, and later reused to
//! rank subcategories at an arbitrary query point.
//!
//! Pipeline: [`site_scout_spatial::build_mask`] ->
//! [`estimator::fit_and_score`] -> [`candidates::filter_candidates`] ->
//! [`cluster::reduce_to_local_maxima`], orchestrated by
//! [`pipeline::Generator`]. Point queries go through [`ranker::rank`].

pub mod candidates;
pub mod cluster;
pub mod config;
pub mod estimator;
pub mod pipeline;
pub mod progress;
pub mod ranker;
pub mod stats;
pub mod store;

pub use config::PipelineConfig;
pub use pipeline::{GenerationRequest, Generator};
pub use store::{ArtifactStore, BusinessSource, MemoryStore, RegionGeometry, RegionSource, StoreError};

use site_scout_density_models::InvalidArtifactError;
use site_scout_spatial::SpatialError;
use thiserror::Error;

/// Errors that can occur while building or querying opportunity maps.
#[derive(Debug, Error)]
pub enum DensityError {
    /// The masked lattice has no valid cells, or the boundary polygon is
    /// degenerate.
    #[error("Empty region: {message}")]
    EmptyRegion {
        /// Why the region produced no cells.
        message: String,
    },

    /// There are no existing business coordinates to fit on.
    #[error("Insufficient data: {message}")]
    InsufficientData {
        /// Which selection had no data.
        message: String,
    },

    /// Density and buffer filtering removed every lattice cell.
    #[error("No candidates: {message}")]
    NoCandidates {
        /// Which parameters eliminated the candidates.
        message: String,
    },

    /// A numeric parameter was out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// The offending parameter and value.
        message: String,
    },

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of what went wrong.
        message: String,
    },

    /// Any other spatial failure (e.g. malformed `GeoJSON`).
    #[error("Spatial error: {0}")]
    Spatial(SpatialError),

    /// The produced artifact violated its invariants.
    #[error(transparent)]
    Artifact(#[from] InvalidArtifactError),

    /// A collaborator store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<SpatialError> for DensityError {
    fn from(e: SpatialError) -> Self {
        match e {
            SpatialError::EmptyRegion { message } | SpatialError::InvalidGeometry { message } => {
                Self::EmptyRegion { message }
            }
            SpatialError::InvalidParameter { message } => Self::InvalidParameter { message },
            other @ SpatialError::GeoJson { .. } => Self::Spatial(other),
        }
    }
}
