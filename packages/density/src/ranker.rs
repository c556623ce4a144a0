//! Point-query ranking of subcategories.

use std::collections::BTreeMap;

use site_scout_density_models::{DensityArtifact, RankedSubcategory};
use site_scout_geography_models::LatLon;

/// Ranks subcategories at `query` by the weight of the nearest artifact
/// point.
///
/// Each artifact contributes only if its nearest point is within
/// `proximity_threshold` degrees of the query. Per subcategory the highest
/// weight wins; artifacts are visited in ascending id order, so on equal
/// weights the older artifact is kept. The result is sorted by descending
/// score, then ascending subcategory name.
#[must_use]
pub fn rank(
    query: LatLon,
    artifacts: &[DensityArtifact],
    proximity_threshold: f64,
) -> Vec<RankedSubcategory> {
    let mut ordered: Vec<&DensityArtifact> = artifacts.iter().collect();
    ordered.sort_by_key(|a| a.id);

    let mut best: BTreeMap<&str, RankedSubcategory> = BTreeMap::new();

    for artifact in ordered {
        if artifact.points.len() != artifact.weights.len() {
            log::warn!(
                "Artifact {} has {} points but {} weights, skipping",
                artifact.id,
                artifact.points.len(),
                artifact.weights.len()
            );
            continue;
        }

        let Some((index, distance)) = nearest(query, &artifact.points) else {
            continue;
        };
        if distance > proximity_threshold {
            continue;
        }

        let score = artifact.weights[index];
        let replace = best
            .get(artifact.subcategory.as_str())
            .is_none_or(|current| score > current.score);

        if replace {
            best.insert(
                artifact.subcategory.as_str(),
                RankedSubcategory {
                    subcategory: artifact.subcategory.clone(),
                    category: artifact.category.clone(),
                    score,
                    nearest_point: artifact.points[index],
                    distance,
                    artifact_id: artifact.id,
                },
            );
        }
    }

    let mut ranked: Vec<RankedSubcategory> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.subcategory.cmp(&b.subcategory))
    });
    ranked
}

/// Linear scan for the closest point in degree space. The first of equally
/// close points wins.
fn nearest(query: LatLon, points: &[LatLon]) -> Option<(usize, f64)> {
    points
        .iter()
        .map(|p| p.degree_distance(query))
        .enumerate()
        .fold(None, |best, (i, d)| match best {
            Some((_, best_d)) if best_d <= d => best,
            _ => Some((i, d)),
        })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn artifact(id: i64, subcategory: &str, points: Vec<LatLon>, weights: Vec<f64>) -> DensityArtifact {
        DensityArtifact {
            id,
            created_at: Utc::now(),
            region_id: 1,
            category: Some("Food".to_string()),
            subcategory: subcategory.to_string(),
            buffer_distance: 0.005,
            percentile: 100.0,
            points,
            weights,
        }
    }

    fn single(id: i64, subcategory: &str, weight: f64) -> DensityArtifact {
        artifact(id, subcategory, vec![LatLon::new(35.7, 51.4)], vec![weight])
    }

    #[test]
    fn sorts_by_descending_score() {
        let ranked = rank(
            LatLon::new(35.7, 51.4),
            &[single(1, "Bakery", 0.3), single(2, "Cafe", 0.9), single(3, "Pharmacy", 0.6)],
            0.0007,
        );
        let names: Vec<&str> = ranked.iter().map(|r| r.subcategory.as_str()).collect();
        assert_eq!(names, vec!["Cafe", "Pharmacy", "Bakery"]);
    }

    #[test]
    fn uses_the_nearest_point() {
        let a = artifact(
            1,
            "Cafe",
            vec![LatLon::new(35.7, 51.4), LatLon::new(35.7003, 51.4)],
            vec![0.2, 0.8],
        );
        let ranked = rank(LatLon::new(35.7002, 51.4), &[a], 0.0007);
        assert_eq!(ranked.len(), 1);
        assert!((ranked[0].score - 0.8).abs() < 1e-12);
        assert_eq!(ranked[0].nearest_point, LatLon::new(35.7003, 51.4));
    }

    #[test]
    fn uncovered_query_is_ignored() {
        let ranked = rank(LatLon::new(35.71, 51.4), &[single(1, "Cafe", 0.9)], 0.0007);
        assert!(ranked.is_empty());
    }

    #[test]
    fn keeps_best_artifact_per_subcategory() {
        let ranked = rank(
            LatLon::new(35.7, 51.4),
            &[single(5, "Cafe", 0.4), single(2, "Cafe", 0.7), single(9, "Cafe", 0.7)],
            0.0007,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].artifact_id, 2);
    }

    #[test]
    fn ties_break_by_name_and_are_stable() {
        let artifacts = [single(1, "Gym", 0.5), single(2, "Bakery", 0.5), single(3, "Cafe", 0.5)];
        let first = rank(LatLon::new(35.7, 51.4), &artifacts, 0.0007);
        let names: Vec<&str> = first.iter().map(|r| r.subcategory.as_str()).collect();
        assert_eq!(names, vec!["Bakery", "Cafe", "Gym"]);

        let mut reversed = artifacts.to_vec();
        reversed.reverse();
        assert_eq!(rank(LatLon::new(35.7, 51.4), &reversed, 0.0007), first);
    }

    #[test]
    fn malformed_artifacts_are_skipped() {
        let broken = artifact(1, "Cafe", vec![LatLon::new(35.7, 51.4)], vec![]);
        assert!(rank(LatLon::new(35.7, 51.4), &[broken], 0.0007).is_empty());
    }
}
