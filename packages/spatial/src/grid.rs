//! Regular lattice over a region's bounding box, masked to valid sites.
//!
//! Lattice order is longitude-major: the outer loop walks longitude and
//! the inner loop walks latitude, each axis taking `min + i * step` for
//! `i in 0..ceil((max - min) / step)`. The upper bound itself is never
//! emitted.

use site_scout_geography_models::{BoundingBox, LatLon};

use crate::{GeoRegion, SpatialError};

/// Default lattice spacing in degrees (roughly 100m).
pub const DEFAULT_GRID_STEP: f64 = 0.001;

/// Upper bound on lattice size; beyond this the step is almost certainly
/// wrong for a city district.
const MAX_GRID_POINTS: usize = 25_000_000;

/// Every lattice point with its validity flag.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedGrid {
    /// All lattice points in generation order.
    pub points: Vec<LatLon>,
    /// `valid[i]` is true iff `points[i]` lies inside the boundary and
    /// outside every exclusion.
    pub valid: Vec<bool>,
}

impl MaskedGrid {
    /// The valid points, preserving lattice order.
    #[must_use]
    pub fn valid_points(&self) -> Vec<LatLon> {
        self.points
            .iter()
            .zip(&self.valid)
            .filter_map(|(p, &ok)| ok.then_some(*p))
            .collect()
    }

    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.valid.iter().filter(|&&ok| ok).count()
    }
}

/// Generates the raw lattice covering `bounds`.
///
/// # Errors
///
/// Returns [`SpatialError::InvalidParameter`] if `step` is not a positive
/// finite number or the lattice would be unreasonably large.
pub fn lattice(bounds: &BoundingBox, step: f64) -> Result<Vec<LatLon>, SpatialError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SpatialError::InvalidParameter {
            message: format!("grid step must be positive, got {step}"),
        });
    }

    let lat_values = axis_values(bounds.min_lat, bounds.max_lat, step);
    let lon_values = axis_values(bounds.min_lon, bounds.max_lon, step);

    let total = lat_values.len().saturating_mul(lon_values.len());
    if total > MAX_GRID_POINTS {
        return Err(SpatialError::InvalidParameter {
            message: format!(
                "grid step {step} produces {total} lattice points (limit {MAX_GRID_POINTS})"
            ),
        });
    }

    let mut points = Vec::with_capacity(total);
    for &lon in &lon_values {
        for &lat in &lat_values {
            points.push(LatLon::new(lat, lon));
        }
    }

    Ok(points)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn axis_values(min: f64, max: f64, step: f64) -> Vec<f64> {
    let span = max - min;
    if span <= 0.0 {
        return Vec::new();
    }
    let count = (span / step).ceil() as usize;
    (0..count).map(|i| (i as f64).mul_add(step, min)).collect()
}

/// Builds the lattice for `region` and flags each point as valid or not.
///
/// # Errors
///
/// Returns [`SpatialError::EmptyRegion`] if no point is valid, and
/// [`SpatialError::InvalidParameter`] for a bad `step`.
pub fn build_mask(region: &GeoRegion, step: f64) -> Result<MaskedGrid, SpatialError> {
    let points = lattice(&region.bounds(), step)?;
    let valid: Vec<bool> = points.iter().map(|&p| region.is_valid_site(p)).collect();

    let grid = MaskedGrid { points, valid };
    let valid_count = grid.valid_count();

    log::debug!(
        "Lattice of {} points at step {step}, {valid_count} valid ({} exclusions)",
        grid.points.len(),
        region.exclusion_count()
    );

    if valid_count == 0 {
        return Err(SpatialError::EmptyRegion {
            message: format!(
                "none of the {} lattice points at step {step} lie inside the boundary \
                 and outside all exclusions",
                grid.points.len()
            ),
        });
    }

    Ok(grid)
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    fn unit_square_region() -> GeoRegion {
        GeoRegion::new(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn lattice_is_longitude_major() {
        let bounds = BoundingBox {
            min_lat: 0.0,
            min_lon: 10.0,
            max_lat: 0.3,
            max_lon: 10.2,
        };
        let points = lattice(&bounds, 0.1).unwrap();
        assert_eq!(points.len(), 6);
        assert!((points[0].lon - 10.0).abs() < 1e-12);
        assert!((points[1].lat - 0.1).abs() < 1e-12);
        assert!((points[1].lon - 10.0).abs() < 1e-12);
        assert!((points[3].lon - 10.1).abs() < 1e-12);
        assert!(points.iter().all(|p| p.lat < 0.3 && p.lon < 10.2));
    }

    #[test]
    fn rejects_non_positive_step() {
        let region = unit_square_region();
        assert!(matches!(
            build_mask(&region, 0.0),
            Err(SpatialError::InvalidParameter { .. })
        ));
        assert!(build_mask(&region, f64::NAN).is_err());
    }

    #[test]
    fn mask_matches_containment() {
        let region = unit_square_region().with_exclusions([polygon![
            (x: 0.45, y: 0.45),
            (x: 0.75, y: 0.45),
            (x: 0.75, y: 0.75),
            (x: 0.45, y: 0.75),
            (x: 0.45, y: 0.45),
        ]]);
        let grid = build_mask(&region, 0.1).unwrap();

        assert_eq!(grid.points.len(), 100);
        for (p, &ok) in grid.points.iter().zip(&grid.valid) {
            let inside = region.boundary_contains(*p);
            let excluded = region.is_excluded(*p);
            assert_eq!(ok, inside && !excluded, "mismatch at {p:?}");
        }
        // Edges at lat 0 / lon 0 drop 19 points, the exclusion removes 9.
        assert_eq!(grid.valid_count(), 81 - 9);
        assert_eq!(grid.valid_points().len(), grid.valid_count());
    }

    #[test]
    fn fully_excluded_region_is_empty() {
        let region = unit_square_region().with_exclusions([polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]]);
        assert!(matches!(
            build_mask(&region, 0.1),
            Err(SpatialError::EmptyRegion { .. })
        ));
    }
}
