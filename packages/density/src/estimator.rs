//! Gaussian kernel density estimation on the sphere.
//!
//! Samples and query points are compared by haversine central angle, so
//! kernel weight falls off with true ground distance regardless of
//! latitude. The bandwidth is chosen from the sample spread in radians.

use std::f64::consts::PI;

use site_scout_geography_models::LatLon;
use site_scout_spatial::haversine::central_angle;

use crate::DensityError;
use crate::stats::min_max_normalize;

/// Dimensionality of the sample space (latitude, longitude).
const DIMENSIONS: f64 = 2.0;

/// A fitted Gaussian KDE with a scalar bandwidth.
#[derive(Debug, Clone)]
pub struct KernelDensity {
    samples: Vec<LatLon>,
    bandwidth: f64,
    /// `ln(n * 2 * pi * h^2)`, subtracted from every log-sum.
    log_norm: f64,
}

impl KernelDensity {
    /// Fits the model with a bandwidth chosen by Silverman's rule.
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::InsufficientData`] if `coords` is empty and
    /// [`DensityError::InvalidParameter`] if a coordinate is not finite.
    pub fn fit(coords: &[LatLon]) -> Result<Self, DensityError> {
        if coords.is_empty() {
            return Err(DensityError::InsufficientData {
                message: "cannot fit a density model without any business locations".to_string(),
            });
        }

        if let Some(bad) = coords
            .iter()
            .find(|p| !p.lat.is_finite() || !p.lon.is_finite())
        {
            return Err(DensityError::InvalidParameter {
                message: format!("non-finite business coordinate {bad:?}"),
            });
        }

        let radians: Vec<(f64, f64)> = coords.iter().map(|p| p.to_radians()).collect();
        let bandwidth = silverman_bandwidth(&radians);

        Ok(Self::with_bandwidth(coords.to_vec(), bandwidth))
    }

    fn with_bandwidth(samples: Vec<LatLon>, bandwidth: f64) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let n = samples.len() as f64;
        let log_norm = (n * 2.0 * PI * bandwidth * bandwidth).ln();
        Self {
            samples,
            bandwidth,
            log_norm,
        }
    }

    /// Kernel bandwidth in radians.
    #[must_use]
    pub const fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Log of the estimated density at `point`.
    #[must_use]
    pub fn log_density(&self, point: LatLon) -> f64 {
        let two_h2 = 2.0 * self.bandwidth * self.bandwidth;

        let exponents: Vec<f64> = self
            .samples
            .iter()
            .map(|&s| {
                let d = central_angle(point, s);
                -(d * d) / two_h2
            })
            .collect();

        // log-sum-exp keeps precision when every kernel term underflows.
        let max = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = exponents.iter().map(|e| (e - max).exp()).sum();

        max + sum.ln() - self.log_norm
    }

    /// Estimated density at each of `points`.
    #[must_use]
    pub fn score(&self, points: &[LatLon]) -> Vec<f64> {
        points.iter().map(|&p| self.log_density(p).exp()).collect()
    }
}

/// Silverman's rule of thumb for a scalar bandwidth in `d = 2` dimensions:
/// `sigma * (n * (d + 2) / 4) ^ (-1 / (d + 4))`.
///
/// `sigma` is the root-mean of the per-axis sample variances. With fewer
/// than two samples, or samples that do not spread at all, it falls back
/// to `1.0`, leaving the unscaled factor.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn silverman_bandwidth(samples: &[(f64, f64)]) -> f64 {
    let n = samples.len() as f64;
    let factor = (n * (DIMENSIONS + 2.0) / 4.0).powf(-1.0 / (DIMENSIONS + 4.0));

    let sigma = if samples.len() < 2 {
        1.0
    } else {
        let mean_lat = samples.iter().map(|s| s.0).sum::<f64>() / n;
        let mean_lon = samples.iter().map(|s| s.1).sum::<f64>() / n;
        let var_lat = samples.iter().map(|s| (s.0 - mean_lat).powi(2)).sum::<f64>() / (n - 1.0);
        let var_lon = samples.iter().map(|s| (s.1 - mean_lon).powi(2)).sum::<f64>() / (n - 1.0);
        let sigma = f64::midpoint(var_lat, var_lon).sqrt();
        if sigma.is_finite() && sigma > 0.0 {
            sigma
        } else {
            1.0
        }
    };

    sigma * factor
}

/// Fits a KDE on `business_coords` and returns its density at every grid
/// point, min-max normalized to `[0, 1]`.
///
/// A flat surface (all densities equal) normalizes to a uniform `0.5`.
///
/// # Errors
///
/// Returns [`DensityError::InsufficientData`] if `business_coords` is empty.
pub fn fit_and_score(
    business_coords: &[LatLon],
    grid_points: &[LatLon],
) -> Result<Vec<f64>, DensityError> {
    let kde = KernelDensity::fit(business_coords)?;
    log::debug!(
        "Fitted KDE on {} samples, bandwidth {:.6} rad",
        kde.sample_count(),
        kde.bandwidth()
    );

    let density = kde.score(grid_points);
    Ok(min_max_normalize(&density))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sample_is_insufficient() {
        assert!(matches!(
            KernelDensity::fit(&[]),
            Err(DensityError::InsufficientData { .. })
        ));
    }

    #[test]
    fn bandwidth_tracks_sample_spread() {
        let tight: Vec<(f64, f64)> = (0..10).map(|i| (0.6 + f64::from(i) * 1e-5, 0.9)).collect();
        let wide: Vec<(f64, f64)> = (0..10).map(|i| (0.6 + f64::from(i) * 1e-3, 0.9)).collect();
        let ratio = silverman_bandwidth(&wide) / silverman_bandwidth(&tight);
        assert!((ratio - 100.0).abs() < 1e-6);
    }

    #[test]
    fn single_sample_uses_unscaled_rule() {
        assert!((silverman_bandwidth(&[(0.1, 0.2)]) - 1.0).abs() < 1e-12);
        let dupes = [(0.1, 0.2); 4];
        let expected = 4.0_f64.powf(-1.0 / 6.0);
        assert!((silverman_bandwidth(&dupes) - expected).abs() < 1e-12);
    }

    #[test]
    fn density_decreases_with_distance() {
        let kde = KernelDensity::fit(&[LatLon::new(35.70, 51.40), LatLon::new(35.71, 51.41)]).unwrap();
        let near = kde.log_density(LatLon::new(35.705, 51.405));
        let far = kde.log_density(LatLon::new(35.80, 51.50));
        assert!(near > far);
    }

    #[test]
    fn duplicates_add_weight() {
        let kde = KernelDensity::fit(&[
            LatLon::new(0.10, 0.10),
            LatLon::new(0.10, 0.10),
            LatLon::new(0.50, 0.50),
        ])
        .unwrap();
        let near_dupes = kde.log_density(LatLon::new(0.12, 0.12));
        let near_single = kde.log_density(LatLon::new(0.48, 0.48));
        assert!(near_dupes > near_single);
    }

    #[test]
    fn scores_are_normalized() {
        let grid: Vec<LatLon> = (0..20)
            .map(|i| LatLon::new(35.6 + f64::from(i) * 0.01, 51.4))
            .collect();
        let density = fit_and_score(
            &[LatLon::new(35.65, 51.4), LatLon::new(35.66, 51.41), LatLon::new(35.70, 51.39)],
            &grid,
        )
        .unwrap();

        assert_eq!(density.len(), grid.len());
        assert!(density.iter().all(|d| (0.0..=1.0).contains(d)));
        assert!(density.iter().any(|&d| d.abs() < 1e-12));
        assert!(density.iter().any(|&d| (d - 1.0).abs() < 1e-12));
    }

    #[test]
    fn single_grid_point_is_degenerate() {
        let density = fit_and_score(&[LatLon::new(1.0, 1.0)], &[LatLon::new(1.1, 1.1)]).unwrap();
        assert_eq!(density, vec![0.5]);
    }
}
