#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the site scout toolchain.
//!
//! Imports districts, exclusion zones, and existing businesses into the
//! `DuckDB` store, generates opportunity maps per subcategory, and ranks
//! subcategories at a chosen location.
//!
//! Uses `indicatif-log-bridge` (via [`site_scout_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod report;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use site_scout_cli_utils::IndicatifProgress;
use site_scout_database::{DuckDbStore, business_db, paths, regions_db};
use site_scout_density::pipeline::suggest_subcategories;
use site_scout_density::progress::LogProgress;
use site_scout_density::{ArtifactStore as _, GenerationRequest, Generator, PipelineConfig};
use site_scout_geography_models::{ExclusionReason, LatLon};
use site_scout_spatial::geojson_io::weighted_points_collection;

#[derive(Parser)]
#[command(name = "site_scout", about = "Business site recommendation from density maps")]
struct Cli {
    /// `DuckDB` file (defaults to `<data>/site_scout.duckdb`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Pipeline configuration TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import districts from a `GeoJSON` `FeatureCollection`
    ImportRegions {
        /// Path to the `GeoJSON` file (features need a `name` property)
        path: PathBuf,
    },
    /// Add an exclusion zone where no business may be placed
    AddExclusion {
        /// Display name of the zone
        #[arg(long)]
        name: String,
        /// Why the zone is excluded (e.g., `military`, `park`, `airport`)
        #[arg(long, default_value = "other", value_parser = parse_reason)]
        reason: ExclusionReason,
        /// Path to a `GeoJSON` Polygon, `MultiPolygon`, or Feature
        path: PathBuf,
    },
    /// Import existing businesses from CSV
    /// (`name,category,subcategory,lat,lon[,rating]`)
    ImportBusinesses {
        /// Path to the CSV file
        path: PathBuf,
    },
    /// List imported districts
    Regions,
    /// Generate an opportunity map for one subcategory
    Generate {
        /// District id
        #[arg(long)]
        region: i64,
        /// Top-level category label stored with the map
        #[arg(long)]
        category: Option<String>,
        /// Subcategory to build the map for
        #[arg(long)]
        subcategory: String,
        /// Minimum distance from existing businesses, in meters
        #[arg(long)]
        buffer_meters: Option<f64>,
        /// Low-density threshold percentile (100 keeps every cell)
        #[arg(long)]
        percentile: Option<f64>,
        /// Recompute even if a map with the same parameters exists
        #[arg(long)]
        force: bool,
        /// Number of suggested sites to print
        #[arg(long, default_value = "10")]
        top: usize,
    },
    /// Generate canonical maps for every subcategory in a district
    GenerateAll {
        /// District id
        #[arg(long)]
        region: i64,
        /// Recompute even if a map with the same parameters exists
        #[arg(long)]
        force: bool,
    },
    /// Rank subcategories at a location using the latest canonical maps
    Suggest {
        /// District id
        #[arg(long)]
        region: i64,
        /// Latitude of the location
        #[arg(long)]
        lat: f64,
        /// Longitude of the location
        #[arg(long)]
        lon: f64,
    },
    /// List stored maps for a district
    Artifacts {
        /// District id
        #[arg(long)]
        region: i64,
    },
    /// Export a stored map as a `GeoJSON` `FeatureCollection` of weighted points
    Export {
        /// Artifact id
        #[arg(long)]
        id: i64,
        /// Output path (defaults to `<data>/exports/artifact_<id>.geojson`)
        out: Option<PathBuf>,
    },
}

fn parse_reason(s: &str) -> Result<ExclusionReason, String> {
    s.parse()
        .map_err(|_| format!("unknown exclusion reason {s:?}"))
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => {
            log::info!("Loading pipeline config from {}", path.display());
            PipelineConfig::load(path)?
        }
        None => {
            log::debug!("No --config given, using default pipeline settings");
            PipelineConfig::default()
        }
    })
}

#[allow(clippy::too_many_lines)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = site_scout_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_ref())?;
    let db_path = cli.db.unwrap_or_else(paths::db_path);
    log::info!("Using database {}", db_path.display());
    let store = Arc::new(DuckDbStore::open(&db_path)?);

    match cli.command {
        Commands::ImportRegions { path } => {
            let text = std::fs::read_to_string(&path)?;
            let imported = store.with_connection(|conn| regions_db::import_regions(conn, &text))?;
            report::print_regions(&imported);
        }
        Commands::AddExclusion { name, reason, path } => {
            let text = std::fs::read_to_string(&path)?;
            let ids = store
                .with_connection(|conn| regions_db::import_exclusion(conn, &name, reason, &text))?;
            println!("Added {} exclusion polygon(s) for {name} ({reason}): {ids:?}", ids.len());
        }
        Commands::ImportBusinesses { path } => {
            let file = std::fs::File::open(&path)?;
            let inserted = store.with_connection(|conn| business_db::import_csv(conn, file))?;
            println!("Imported {inserted} businesses from {}", path.display());
        }
        Commands::Regions => {
            let regions = store.with_connection(|conn| regions_db::list_regions(conn))?;
            report::print_regions(&regions);
        }
        Commands::Generate {
            region,
            category,
            subcategory,
            buffer_meters,
            percentile,
            force,
            top,
        } => {
            if let Some(buffer_meters) = buffer_meters {
                config.buffer_meters = buffer_meters;
            }
            if let Some(percentile) = percentile {
                config.percentile = percentile;
            }
            if force {
                config.reuse_existing = false;
            }
            config.validate()?;

            let request = GenerationRequest::from_config(&config, region, category, &subcategory);
            let generator = Generator::new(store.clone(), store.clone(), store.clone(), config)
                .with_progress(IndicatifProgress::run_bar(&multi, &subcategory));

            let outcome = generator.run(&request);
            report::print_outcome(&request, &outcome, top);
            if !outcome.status.is_success() {
                return Err(format!("{}: {}", outcome.status, outcome.message).into());
            }
        }
        Commands::GenerateAll { region, force } => {
            if force {
                config.reuse_existing = false;
            }
            config.validate()?;

            let generator = Generator::new(store.clone(), store.clone(), store.clone(), config)
                .with_progress(LogProgress::shared(format!("region {region}")));
            let results = generator.run_all(region)?;
            report::print_batch(&results);
        }
        Commands::Suggest { region, lat, lon } => {
            let ranked = suggest_subcategories(
                store.as_ref(),
                region,
                LatLon::new(lat, lon),
                config.proximity_threshold,
            )?;
            report::print_ranking(&ranked);
        }
        Commands::Artifacts { region } => {
            let artifacts = store.get_all_for_region(region)?;
            report::print_artifacts(&artifacts);
        }
        Commands::Export { id, out } => {
            let artifact = store
                .get(id)?
                .ok_or_else(|| format!("Unknown artifact: {id}"))?;
            let out = match out {
                Some(out) => out,
                None => {
                    let dir = paths::exports_dir();
                    paths::ensure_dir(&dir)?;
                    dir.join(format!("artifact_{id}.geojson"))
                }
            };
            std::fs::write(&out, weighted_points_collection(&artifact.points, &artifact.weights))?;
            println!(
                "Exported {} points of artifact {id} to {}",
                artifact.points.len(),
                out.display()
            );
        }
    }

    Ok(())
}
