//! A district polygon with its exclusion zones.

use geo::{
    Area as _, BoundingRect as _, Closest, ClosestPoint as _, Contains as _, Intersects as _,
    Polygon, Validation as _,
};
use rstar::{AABB, RTree, RTreeObject};
use site_scout_geography_models::{BoundingBox, LatLon};

use crate::SpatialError;

/// Whether `point` lies inside `polygon` or within `margin` degrees of it
/// (planar degree distance to the closest point of the polygon).
#[must_use]
pub fn within_margin(polygon: &Polygon<f64>, point: LatLon, margin: f64) -> bool {
    let p = geo::Point::new(point.lon, point.lat);
    if polygon.contains(&p) {
        return true;
    }

    match polygon.closest_point(&p) {
        Closest::Intersection(_) => true,
        Closest::SinglePoint(c) => (c.x() - p.x()).hypot(c.y() - p.y()) <= margin,
        Closest::Indeterminate => false,
    }
}

/// An exclusion polygon stored in the R-tree.
struct ExclusionEntry {
    envelope: AABB<[f64; 2]>,
    polygon: Polygon<f64>,
}

impl RTreeObject for ExclusionEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A district boundary plus the banned sub-areas inside or overlapping it.
///
/// Polygons use `x = longitude`, `y = latitude`. A point is a valid site
/// iff the boundary contains it and no exclusion contains it. Points lying
/// exactly on an edge are not contained.
pub struct GeoRegion {
    boundary: Polygon<f64>,
    bounds: BoundingBox,
    exclusions: RTree<ExclusionEntry>,
}

impl GeoRegion {
    /// Validates `boundary` and builds a region with no exclusions.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::InvalidGeometry`] if the polygon has a
    /// zero-extent bounding box, is self-intersecting, or has zero area.
    pub fn new(boundary: Polygon<f64>) -> Result<Self, SpatialError> {
        if boundary.exterior().0.len() < 4 {
            return Err(SpatialError::InvalidGeometry {
                message: format!(
                    "boundary ring has {} coordinates, need at least 4",
                    boundary.exterior().0.len()
                ),
            });
        }

        let rect = boundary
            .bounding_rect()
            .ok_or_else(|| SpatialError::InvalidGeometry {
                message: "boundary has no bounding box".to_string(),
            })?;

        let bounds = BoundingBox {
            min_lat: rect.min().y,
            min_lon: rect.min().x,
            max_lat: rect.max().y,
            max_lon: rect.max().x,
        };

        if !bounds.is_non_degenerate() {
            return Err(SpatialError::InvalidGeometry {
                message: format!("boundary has zero extent: {bounds:?}"),
            });
        }

        if let Err(e) = boundary.check_validation() {
            return Err(SpatialError::InvalidGeometry {
                message: e.to_string(),
            });
        }

        if boundary.unsigned_area() <= 0.0 {
            return Err(SpatialError::InvalidGeometry {
                message: "boundary has zero area".to_string(),
            });
        }

        Ok(Self {
            boundary,
            bounds,
            exclusions: RTree::new(),
        })
    }

    /// Adds exclusion polygons. Polygons that do not touch the boundary
    /// are ignored since they can never exclude a lattice point.
    #[must_use]
    pub fn with_exclusions(mut self, exclusions: impl IntoIterator<Item = Polygon<f64>>) -> Self {
        for polygon in exclusions {
            self.add_exclusion(polygon);
        }
        self
    }

    /// Adds a single exclusion polygon.
    pub fn add_exclusion(&mut self, polygon: Polygon<f64>) {
        if !polygon.intersects(&self.boundary) {
            log::debug!("Skipping exclusion that does not intersect the region boundary");
            return;
        }

        let Some(rect) = polygon.bounding_rect() else {
            return;
        };

        self.exclusions.insert(ExclusionEntry {
            envelope: AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
            polygon,
        });
    }

    #[must_use]
    pub const fn boundary(&self) -> &Polygon<f64> {
        &self.boundary
    }

    /// Number of exclusion polygons that overlap the boundary.
    #[must_use]
    pub fn exclusion_count(&self) -> usize {
        self.exclusions.size()
    }

    /// Axis-aligned bounds of the boundary polygon.
    #[must_use]
    pub const fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Whether the boundary polygon strictly contains `point`.
    #[must_use]
    pub fn boundary_contains(&self, point: LatLon) -> bool {
        self.boundary.contains(&geo::Point::new(point.lon, point.lat))
    }

    /// Whether any exclusion polygon strictly contains `point`.
    #[must_use]
    pub fn is_excluded(&self, point: LatLon) -> bool {
        let p = geo::Point::new(point.lon, point.lat);
        let query_env = AABB::from_point([point.lon, point.lat]);

        self.exclusions
            .locate_in_envelope_intersecting(&query_env)
            .any(|entry| entry.polygon.contains(&p))
    }

    /// Whether `point` is inside the boundary or within `margin` degrees
    /// of it.
    #[must_use]
    pub fn within_margin(&self, point: LatLon, margin: f64) -> bool {
        within_margin(&self.boundary, point, margin)
    }

    /// Inside the boundary and outside every exclusion.
    #[must_use]
    pub fn is_valid_site(&self, point: LatLon) -> bool {
        self.boundary_contains(point) && !self.is_excluded(point)
    }
}
