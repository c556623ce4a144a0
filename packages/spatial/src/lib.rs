#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! District geometry and spatial lookups for site recommendation.
//!
//! Holds the district polygon together with its exclusion zones
//! ([`GeoRegion`]), builds the regular lattice the density surface is
//! evaluated on ([`grid`]), and provides R-tree indexes for nearest-point
//! and neighborhood queries in both degree space and on the unit sphere.

pub mod geojson_io;
pub mod grid;
pub mod haversine;
pub mod index;
pub mod region;

pub use grid::{MaskedGrid, build_mask};
pub use region::GeoRegion;

use thiserror::Error;

/// Errors that can occur during spatial operations.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// The district boundary is unusable (self-intersecting, zero area,
    /// or too few vertices).
    #[error("Invalid region geometry: {message}")]
    InvalidGeometry {
        /// Description of what went wrong.
        message: String,
    },

    /// No lattice cell survived boundary and exclusion masking.
    #[error("No valid grid cells: {message}")]
    EmptyRegion {
        /// Description of why the mask is empty.
        message: String,
    },

    /// `GeoJSON` could not be parsed or had an unexpected shape.
    #[error("GeoJSON error: {message}")]
    GeoJson {
        /// Description of what went wrong.
        message: String,
    },

    /// A grid or search parameter was out of range.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the offending value.
        message: String,
    },
}
