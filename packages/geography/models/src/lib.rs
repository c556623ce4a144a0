#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate, region, and business location types.
//!
//! Coordinates are WGS84 degrees. Throughout the workspace a location is
//! written latitude first ([`LatLon`]), while polygon geometry follows the
//! `GeoJSON` convention of `x = longitude`, `y = latitude`.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A geographic coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLon {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl LatLon {
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns `(lat, lon)` converted to radians.
    #[must_use]
    pub fn to_radians(self) -> (f64, f64) {
        (self.lat.to_radians(), self.lon.to_radians())
    }

    /// Planar distance in raw degree space.
    ///
    /// This is not a ground distance: one degree of longitude shrinks with
    /// latitude, so the same value covers fewer meters east-west away from
    /// the equator.
    #[must_use]
    pub fn degree_distance(self, other: Self) -> f64 {
        (self.lat - other.lat).hypot(self.lon - other.lon)
    }

    /// `[lat, lon]` array form, used as an R-tree point.
    #[must_use]
    pub const fn as_array(self) -> [f64; 2] {
        [self.lat, self.lon]
    }
}

/// An axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    /// Returns `true` if the box has positive extent on both axes.
    #[must_use]
    pub fn is_non_degenerate(&self) -> bool {
        self.max_lat > self.min_lat && self.max_lon > self.min_lon
    }
}

/// A stored administrative district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSummary {
    /// Database primary key.
    pub id: i64,
    /// Human-readable district name.
    pub name: String,
}

/// Why an area is closed to new businesses.
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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExclusionReason {
    Military,
    Jungle,
    Park,
    Airport,
    Government,
    Highway,
    Lake,
    Other,
}

/// An existing business location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRecord {
    /// Display name, if known.
    pub name: Option<String>,
    /// Top-level category label (e.g. "Food").
    pub category: String,
    /// Subcategory label (e.g. "Cafe"). Density maps are built per
    /// subcategory.
    pub subcategory: String,
    /// Where the business is.
    pub location: LatLon,
    /// Optional user rating.
    pub rating: Option<f64>,
}

/// A `(category, subcategory)` pair present in the business store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryRef {
    pub category: String,
    pub subcategory: String,
}
