//! R-tree point indexes.
//!
//! [`PlanarIndex`] answers nearest-point queries in raw degree space.
//! [`SphereIndex`] answers "all points within a haversine radius" queries
//! by indexing unit vectors and converting the angular radius to a chord.

use rstar::RTree;
use rstar::primitives::GeomWithData;
use site_scout_geography_models::LatLon;

use crate::haversine::{chord_length, unit_vector};

type PlanarEntry = GeomWithData<[f64; 2], usize>;
type SphereEntry = GeomWithData<[f64; 3], usize>;

/// Nearest-neighbor index over `[lat, lon]` degree coordinates.
pub struct PlanarIndex {
    tree: RTree<PlanarEntry>,
}

impl PlanarIndex {
    /// Bulk-loads the points; each entry remembers its input position.
    #[must_use]
    pub fn new(points: &[LatLon]) -> Self {
        let entries = points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new(p.as_array(), i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Position and degree-space distance of the nearest indexed point.
    #[must_use]
    pub fn nearest(&self, point: LatLon) -> Option<(usize, f64)> {
        let query = point.as_array();
        self.tree.nearest_neighbor(&query).map(|entry| {
            let [lat, lon] = *entry.geom();
            (entry.data, LatLon::new(lat, lon).degree_distance(point))
        })
    }
}

/// Neighborhood index on the unit sphere.
pub struct SphereIndex {
    tree: RTree<SphereEntry>,
}

impl SphereIndex {
    /// Indexes `(lat, lon)` radian pairs.
    #[must_use]
    pub fn new(points_rad: &[(f64, f64)]) -> Self {
        let entries = points_rad
            .iter()
            .enumerate()
            .map(|(i, &p)| GeomWithData::new(unit_vector(p), i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Input positions of every point whose central angle to `point` is at
    /// most `radius` radians, in ascending order. Includes `point` itself
    /// when it is indexed.
    #[must_use]
    pub fn within(&self, point: (f64, f64), radius: f64) -> Vec<usize> {
        let chord = chord_length(radius);
        let mut hits: Vec<usize> = self
            .tree
            .locate_within_distance(unit_vector(point), chord * chord)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }
}
