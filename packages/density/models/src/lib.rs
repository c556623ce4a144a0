#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Density artifact, local maximum, and run status types.
//!
//! A [`DensityArtifact`] is one persisted run of the opportunity pipeline
//! for a `(region, subcategory, buffer, percentile)` combination. Artifacts
//! are immutable; a later run with the same key supersedes an earlier one
//! by having a higher id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use site_scout_geography_models::LatLon;
use strum_macros::{AsRefStr, Display, EnumString};

/// Percentile that marks a canonical artifact, i.e. one usable for
/// cross-subcategory ranking.
pub const CANONICAL_PERCENTILE: f64 = 100.0;

/// The parameters that identify an artifact. Two runs that differ in any
/// field are distinct artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactKey {
    pub region_id: i64,
    pub subcategory: String,
    /// Low-density threshold percentile (0-100).
    pub percentile: f64,
    /// Minimum separation from existing businesses, in degrees.
    pub buffer_distance: f64,
}

/// A scored point cloud ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArtifact {
    pub region_id: i64,
    /// Top-level category label, if known.
    pub category: Option<String>,
    pub subcategory: String,
    pub buffer_distance: f64,
    pub percentile: f64,
    /// Candidate locations that survived masking and buffering.
    pub points: Vec<LatLon>,
    /// Opportunity weight per point, in `[0, 1]`.
    pub weights: Vec<f64>,
}

impl NewArtifact {
    /// Checks the parallel-array and weight-range invariants.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidArtifactError`] if `points` and `weights` differ in
    /// length or a weight falls outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), InvalidArtifactError> {
        if self.points.len() != self.weights.len() {
            return Err(InvalidArtifactError {
                message: format!(
                    "{} points but {} weights",
                    self.points.len(),
                    self.weights.len()
                ),
            });
        }

        if let Some((i, w)) = self
            .weights
            .iter()
            .enumerate()
            .find(|(_, w)| !(0.0..=1.0).contains(*w))
        {
            return Err(InvalidArtifactError {
                message: format!("weight {w} at index {i} is outside [0, 1]"),
            });
        }

        Ok(())
    }

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

/// A persisted density artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DensityArtifact {
    /// Store-assigned id. Higher means more recent.
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub region_id: i64,
    pub category: Option<String>,
    pub subcategory: String,
    pub buffer_distance: f64,
    pub percentile: f64,
    pub points: Vec<LatLon>,
    pub weights: Vec<f64>,
}

impl DensityArtifact {
    /// Assigns an id and timestamp to a validated [`NewArtifact`].
    #[must_use]
    pub fn from_new(id: i64, created_at: DateTime<Utc>, artifact: NewArtifact) -> Self {
        Self {
            id,
            created_at,
            region_id: artifact.region_id,
            category: artifact.category,
            subcategory: artifact.subcategory,
            buffer_distance: artifact.buffer_distance,
            percentile: artifact.percentile,
            points: artifact.points,
            weights: artifact.weights,
        }
    }

    #[must_use]
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            region_id: self.region_id,
            subcategory: self.subcategory.clone(),
            percentile: self.percentile,
            buffer_distance: self.buffer_distance,
        }
    }

    #[must_use]
    pub fn matches_key(&self, key: &ArtifactKey) -> bool {
        self.key() == *key
    }

    /// Whether this artifact can be used for cross-subcategory ranking.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_canonical(&self) -> bool {
        self.percentile == CANONICAL_PERCENTILE
    }
}

/// The highest-weight candidate within one spatial cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMaximum {
    pub point: LatLon,
    pub weight: f64,
}

/// One row of a point-query ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSubcategory {
    pub subcategory: String,
    pub category: Option<String>,
    /// Opportunity weight of the artifact point nearest the query.
    pub score: f64,
    pub nearest_point: LatLon,
    /// Degree-space distance from the query to `nearest_point`.
    pub distance: f64,
    pub artifact_id: i64,
}

/// Terminal status of a generation run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// An artifact was written.
    Success,
    /// An artifact with the same key already existed and was reused.
    Reused,
    /// No existing businesses for the selection.
    NoData,
    /// Masking left no lattice cells.
    EmptyRegion,
    /// Density/buffer filtering removed every candidate.
    NoCandidates,
    /// Infrastructure or parameter failure.
    Failed,
}

impl RunStatus {
    /// Whether a usable artifact exists after the run.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::Reused)
    }
}

/// Everything a caller needs to report on a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Human-readable summary suitable for display.
    pub message: String,
    pub artifact_id: Option<i64>,
    /// Existing businesses the density model was fit on.
    pub business_count: usize,
    /// Candidates persisted in the artifact.
    pub candidate_count: usize,
    /// Suggested sites, highest weight first.
    pub local_maxima: Vec<LocalMaximum>,
}

impl RunOutcome {
    /// An unsuccessful outcome with no artifact.
    #[must_use]
    pub fn failure(status: RunStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            artifact_id: None,
            business_count: 0,
            candidate_count: 0,
            local_maxima: Vec::new(),
        }
    }
}

/// Error returned when a [`NewArtifact`] violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidArtifactError {
    /// Which invariant failed.
    pub message: String,
}

impl std::fmt::Display for InvalidArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid artifact: {}", self.message)
    }
}

impl std::error::Error for InvalidArtifactError {}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    fn artifact(points: usize, weights: Vec<f64>) -> NewArtifact {
        NewArtifact {
            region_id: 1,
            category: Some("Food".to_string()),
            subcategory: "Cafe".to_string(),
            buffer_distance: 0.005,
            percentile: 100.0,
            points: vec![LatLon::new(0.0, 0.0); points],
            weights,
        }
    }

    #[test]
    fn validate_rejects_length_mismatch() {
        assert!(artifact(2, vec![0.5]).validate().is_err());
        assert!(artifact(2, vec![0.5, 1.0]).validate().is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_weights() {
        let err = artifact(2, vec![0.5, 1.5]).validate().unwrap_err();
        assert!(err.to_string().contains("index 1"));
        assert!(artifact(1, vec![f64::NAN]).validate().is_err());
    }

    #[test]
    fn canonical_only_at_full_percentile() {
        let mut stored = DensityArtifact::from_new(7, Utc::now(), artifact(1, vec![1.0]));
        assert!(stored.is_canonical());
        stored.percentile = 50.0;
        assert!(!stored.is_canonical());
    }

    #[test]
    fn key_includes_every_parameter() {
        let new = artifact(1, vec![1.0]);
        let stored = DensityArtifact::from_new(1, Utc::now(), new.clone());
        assert!(stored.matches_key(&new.key()));

        let mut other = new.key();
        other.buffer_distance = 0.01;
        assert!(!stored.matches_key(&other));
    }

    #[test]
    fn run_status_display_round_trip() {
        for status in [
            RunStatus::Success,
            RunStatus::Reused,
            RunStatus::NoData,
            RunStatus::EmptyRegion,
            RunStatus::NoCandidates,
            RunStatus::Failed,
        ] {
            let s = status.to_string();
            assert_eq!(RunStatus::from_str(&s).unwrap(), status);
        }
        assert_eq!(RunStatus::NoCandidates.as_ref(), "NO_CANDIDATES");
    }
}
