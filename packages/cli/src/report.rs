//! Plain-text tables for CLI output.

use site_scout_density::GenerationRequest;
use site_scout_density_models::{DensityArtifact, RankedSubcategory, RunOutcome};
use site_scout_geography_models::RegionSummary;

pub fn print_regions(regions: &[RegionSummary]) {
    if regions.is_empty() {
        println!("No regions.");
        return;
    }

    println!("{:>6}  Name", "Id");
    for region in regions {
        println!("{:>6}  {}", region.id, region.name);
    }
}

pub fn print_outcome(request: &GenerationRequest, outcome: &RunOutcome, top: usize) {
    println!(
        "{} (region {}, percentile {}, buffer {:.5} deg): {}",
        request.subcategory,
        request.region_id,
        request.percentile,
        request.buffer_distance,
        outcome.status
    );
    println!("  {}", outcome.message);

    if let Some(id) = outcome.artifact_id {
        println!(
            "  artifact {id}: {} candidates from {} businesses",
            outcome.candidate_count, outcome.business_count
        );
    }

    if outcome.local_maxima.is_empty() {
        return;
    }

    println!();
    println!("  {:>3}  {:>10}  {:>11}  {:>7}", "#", "Lat", "Lon", "Weight");
    for (i, maximum) in outcome.local_maxima.iter().take(top).enumerate() {
        println!(
            "  {:>3}  {:>10.5}  {:>11.5}  {:>7.3}",
            i + 1,
            maximum.point.lat,
            maximum.point.lon,
            maximum.weight
        );
    }
}

pub fn print_batch(results: &[(GenerationRequest, RunOutcome)]) {
    if results.is_empty() {
        println!("No subcategories found near this region.");
        return;
    }

    println!("{:<28}  {:<14}  {:>9}  {:>10}", "Subcategory", "Status", "Artifact", "Candidates");
    for (request, outcome) in results {
        let artifact = outcome
            .artifact_id
            .map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:<28}  {:<14}  {:>9}  {:>10}",
            request.subcategory, outcome.status, artifact, outcome.candidate_count
        );
    }

    let succeeded = results.iter().filter(|(_, o)| o.status.is_success()).count();
    println!();
    println!("{succeeded}/{} maps available", results.len());
}

pub fn print_ranking(ranked: &[RankedSubcategory]) {
    if ranked.is_empty() {
        println!("No canonical maps cover this location.");
        return;
    }

    println!(
        "{:>3}  {:<28}  {:<16}  {:>7}  {:>9}",
        "#", "Subcategory", "Category", "Score", "Distance"
    );
    for (i, row) in ranked.iter().enumerate() {
        println!(
            "{:>3}  {:<28}  {:<16}  {:>7.3}  {:>9.6}",
            i + 1,
            row.subcategory,
            row.category.as_deref().unwrap_or("-"),
            row.score,
            row.distance
        );
    }
}

pub fn print_artifacts(artifacts: &[DensityArtifact]) {
    if artifacts.is_empty() {
        println!("No artifacts.");
        return;
    }

    println!(
        "{:>6}  {:<28}  {:>10}  {:>9}  {:>7}  Created",
        "Id", "Subcategory", "Percentile", "Buffer", "Points"
    );
    for artifact in artifacts {
        let marker = if artifact.is_canonical() { "*" } else { " " };
        println!(
            "{:>6}{marker} {:<28}  {:>10}  {:>9.5}  {:>7}  {}",
            artifact.id,
            artifact.subcategory,
            artifact.percentile,
            artifact.buffer_distance,
            artifact.points.len(),
            artifact.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
