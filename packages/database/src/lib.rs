#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` persistence for the site recommender.
//!
//! A single `DuckDB` file holds district boundaries, exclusion zones,
//! existing businesses, and generated density artifacts. Geometry is stored
//! as `GeoJSON` TEXT (no spatial extension), and spatial filtering happens
//! in Rust after a bounding-box prefilter in SQL.

pub mod artifact_db;
pub mod business_db;
pub mod db;
pub mod paths;
pub mod regions_db;
pub mod store;

pub use store::DuckDbStore;

use site_scout_spatial::SpatialError;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// Filesystem error while opening the database or reading an import.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored or imported geometry could not be parsed.
    #[error("Geometry error: {0}")]
    Spatial(#[from] SpatialError),

    /// Stored weights could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A CSV import row was malformed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
