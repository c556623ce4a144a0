//! Low-density, buffered candidate selection.
//!
//! A lattice cell becomes a candidate when its normalized density is below
//! the percentile threshold and it is at least `buffer_distance` (degree
//! space) away from every existing business. Surviving densities are
//! rescaled and inverted so the least contested cell scores `1.0`.
//!
//! `percentile = 100` is the "keep everything" setting: no cell is removed
//! by the threshold, only by the buffer. Lower percentiles keep
//! progressively smaller low-density bands, and `percentile = 0` keeps
//! nothing.

use site_scout_geography_models::LatLon;
use site_scout_spatial::index::PlanarIndex;

use crate::DensityError;
use crate::stats::{min_max_normalize, percentile};

/// Candidate sites and their opportunity weights (parallel vectors).
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    pub points: Vec<LatLon>,
    /// In `[0, 1]`; higher means less competing density.
    pub weights: Vec<f64>,
}

impl CandidateSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Indices of the cells that pass the low-density threshold, in input
/// order.
///
/// The threshold is the `percentile`-th percentile of the non-negative
/// densities and a cell passes when it is strictly below it. At
/// `percentile >= 100` every non-negative cell passes.
#[must_use]
pub fn low_density_indices(density: &[f64], percentile_value: f64) -> Vec<usize> {
    if percentile_value >= 100.0 {
        return density
            .iter()
            .enumerate()
            .filter_map(|(i, &d)| (d >= 0.0).then_some(i))
            .collect();
    }

    let Some(threshold) = percentile(density, percentile_value) else {
        return Vec::new();
    };

    density
        .iter()
        .enumerate()
        .filter_map(|(i, &d)| (d >= 0.0 && d < threshold).then_some(i))
        .collect()
}

/// Selects buffered low-density candidates and scores them.
///
/// # Errors
///
/// - [`DensityError::InvalidParameter`] if the inputs are mismatched or a
///   parameter is out of range.
/// - [`DensityError::InsufficientData`] if `business_coords` is empty.
/// - [`DensityError::NoCandidates`] if nothing survives both filters.
pub fn filter_candidates(
    density: &[f64],
    grid_points: &[LatLon],
    business_coords: &[LatLon],
    percentile_value: f64,
    buffer_distance: f64,
) -> Result<CandidateSet, DensityError> {
    if density.len() != grid_points.len() {
        return Err(DensityError::InvalidParameter {
            message: format!(
                "{} density values for {} grid points",
                density.len(),
                grid_points.len()
            ),
        });
    }
    if !(0.0..=100.0).contains(&percentile_value) {
        return Err(DensityError::InvalidParameter {
            message: format!("percentile must be within 0-100, got {percentile_value}"),
        });
    }
    if !buffer_distance.is_finite() || buffer_distance < 0.0 {
        return Err(DensityError::InvalidParameter {
            message: format!("buffer distance must be non-negative, got {buffer_distance}"),
        });
    }
    if business_coords.is_empty() {
        return Err(DensityError::InsufficientData {
            message: "buffer filtering needs at least one business location".to_string(),
        });
    }

    let low = low_density_indices(density, percentile_value);
    let raw_count = low.len();

    let businesses = PlanarIndex::new(business_coords);
    let survivors: Vec<usize> = low
        .into_iter()
        .filter(|&i| {
            businesses
                .nearest(grid_points[i])
                .is_some_and(|(_, dist)| dist >= buffer_distance)
        })
        .collect();

    log::debug!(
        "{raw_count} cells below the {percentile_value} percentile threshold, {} outside \
         the {buffer_distance} buffer",
        survivors.len()
    );

    if survivors.is_empty() {
        return Err(DensityError::NoCandidates {
            message: format!(
                "{raw_count} low-density cells at percentile {percentile_value}, none at least \
                 {buffer_distance} from an existing business"
            ),
        });
    }

    let surviving_density: Vec<f64> = survivors.iter().map(|&i| density[i]).collect();
    let weights = min_max_normalize(&surviving_density)
        .into_iter()
        .map(|d| 1.0 - d)
        .collect();
    let points = survivors.iter().map(|&i| grid_points[i]).collect();

    Ok(CandidateSet { points, weights })
}
