//! Pipeline tunables, loadable from TOML.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```toml
//! grid_step = 0.0005
//! buffer_meters = 300
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use site_scout_spatial::grid::DEFAULT_GRID_STEP;

use crate::DensityError;

/// Default DBSCAN neighborhood radius in radians. Small enough to only
/// merge adjacent duplicates of the same lattice cell.
pub const DEFAULT_CLUSTER_EPS: f64 = 0.000_03;

/// Default maximum distance (degrees) from a query point to the nearest
/// artifact point for the artifact to score the query.
pub const DEFAULT_PROXIMITY_THRESHOLD: f64 = 0.0007;

/// Default margin (degrees) around a district within which existing
/// businesses still count toward its density.
pub const DEFAULT_REGION_MARGIN: f64 = 0.01;

/// Tunables for generation runs and point queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lattice spacing in degrees.
    pub grid_step: f64,
    /// DBSCAN neighborhood radius in radians.
    pub cluster_eps: f64,
    /// DBSCAN core-point threshold (the point itself counts).
    pub cluster_min_samples: usize,
    /// Query coverage radius in degrees.
    pub proximity_threshold: f64,
    /// Business search margin around a district, in degrees.
    pub region_margin: f64,
    /// Minimum separation from existing businesses, in meters.
    pub buffer_meters: f64,
    /// Meters per degree used to turn `buffer_meters` into a degree-space
    /// buffer. The buffer is compared against planar degree distances, so
    /// the effective ground distance shrinks east-west away from the
    /// equator.
    pub meters_per_degree: f64,
    /// Low-density threshold percentile (0-100). 100 keeps every cell.
    pub percentile: f64,
    /// Skip recomputation when an artifact with the same key exists.
    pub reuse_existing: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grid_step: DEFAULT_GRID_STEP,
            cluster_eps: DEFAULT_CLUSTER_EPS,
            cluster_min_samples: 1,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            region_margin: DEFAULT_REGION_MARGIN,
            buffer_meters: 500.0,
            meters_per_degree: 100_000.0,
            percentile: 100.0,
            reuse_existing: false,
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML document, filling unspecified fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::Config`] if the document is malformed and
    /// [`DensityError::InvalidParameter`] if a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, DensityError> {
        let config: Self = toml::from_str(text).map_err(|e| DensityError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::Config`] if the file cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self, DensityError> {
        let text = std::fs::read_to_string(path).map_err(|e| DensityError::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        log::debug!("Loaded pipeline config from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// The buffer distance in degree space.
    #[must_use]
    pub fn buffer_distance(&self) -> f64 {
        self.buffer_meters / self.meters_per_degree
    }

    /// Checks that every tunable is in range.
    ///
    /// # Errors
    ///
    /// Returns [`DensityError::InvalidParameter`] naming the first bad
    /// value.
    pub fn validate(&self) -> Result<(), DensityError> {
        let positive = [
            ("grid_step", self.grid_step),
            ("cluster_eps", self.cluster_eps),
            ("proximity_threshold", self.proximity_threshold),
            ("meters_per_degree", self.meters_per_degree),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(DensityError::InvalidParameter {
                    message: format!("{name} must be positive, got {value}"),
                });
            }
        }

        let non_negative = [
            ("region_margin", self.region_margin),
            ("buffer_meters", self.buffer_meters),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(DensityError::InvalidParameter {
                    message: format!("{name} must be non-negative, got {value}"),
                });
            }
        }

        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(DensityError::InvalidParameter {
                message: format!("percentile must be within 0-100, got {}", self.percentile),
            });
        }

        if self.cluster_min_samples == 0 {
            return Err(DensityError::InvalidParameter {
                message: "cluster_min_samples must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert!((config.buffer_distance() - 0.005).abs() < 1e-12);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str("grid_step = 0.0005\npercentile = 80.0\n").unwrap();
        assert!((config.grid_step - 0.0005).abs() < 1e-15);
        assert!((config.percentile - 80.0).abs() < 1e-12);
        assert_eq!(config.cluster_min_samples, 1);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(matches!(
            PipelineConfig::from_toml_str("percentile = 120.0"),
            Err(DensityError::InvalidParameter { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("grid_step = -1.0"),
            Err(DensityError::InvalidParameter { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("grid_step = \"wide\""),
            Err(DensityError::Config { .. })
        ));
    }
}
