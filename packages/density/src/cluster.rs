//! Density-based clustering of candidates and per-cluster local maxima.

use site_scout_density_models::LocalMaximum;
use site_scout_geography_models::LatLon;
use site_scout_spatial::index::SphereIndex;

use crate::DensityError;

/// Labels `points_rad` with DBSCAN under the haversine metric.
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within `eps` radians. Clusters grow from core points in
/// input order, so labels are assigned `0, 1, 2, ...` by first appearance.
/// Noise points get `None`.
#[must_use]
pub fn dbscan(points_rad: &[(f64, f64)], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let index = SphereIndex::new(points_rad);
    let neighborhoods: Vec<Vec<usize>> = points_rad
        .iter()
        .map(|&p| index.within(p, eps))
        .collect();
    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|n| n.len() >= min_samples)
        .collect();

    let mut labels = vec![None; points_rad.len()];
    let mut next_label = 0;

    for start in 0..points_rad.len() {
        if labels[start].is_some() || !is_core[start] {
            continue;
        }

        labels[start] = Some(next_label);
        let mut stack = vec![start];

        while let Some(current) = stack.pop() {
            if !is_core[current] {
                continue;
            }
            for &neighbor in &neighborhoods[current] {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(next_label);
                    stack.push(neighbor);
                }
            }
        }

        next_label += 1;
    }

    labels
}

/// Clusters weighted candidates and keeps the heaviest point of each
/// cluster.
///
/// Results are in ascending cluster-label order. Within a cluster the
/// first point (input order) with the maximum weight wins. Noise points
/// never become maxima.
///
/// # Errors
///
/// Returns [`DensityError::InvalidParameter`] if `points` and `weights`
/// differ in length, `eps` is not positive, or `min_samples` is zero.
pub fn reduce_to_local_maxima(
    points: &[LatLon],
    weights: &[f64],
    eps: f64,
    min_samples: usize,
) -> Result<Vec<LocalMaximum>, DensityError> {
    if points.len() != weights.len() {
        return Err(DensityError::InvalidParameter {
            message: format!("{} points but {} weights", points.len(), weights.len()),
        });
    }
    if !eps.is_finite() || eps <= 0.0 {
        return Err(DensityError::InvalidParameter {
            message: format!("cluster eps must be positive, got {eps}"),
        });
    }
    if min_samples == 0 {
        return Err(DensityError::InvalidParameter {
            message: "min_samples must be at least 1".to_string(),
        });
    }

    let radians: Vec<(f64, f64)> = points.iter().map(|p| p.to_radians()).collect();
    let labels = dbscan(&radians, eps, min_samples);

    let cluster_count = labels.iter().flatten().max().map_or(0, |&max| max + 1);
    let mut best: Vec<Option<usize>> = vec![None; cluster_count];

    for (i, label) in labels.iter().enumerate() {
        let Some(label) = *label else {
            continue;
        };
        if best[label].is_none_or(|current| weights[i] > weights[current]) {
            best[label] = Some(i);
        }
    }

    log::debug!(
        "{} candidates formed {cluster_count} clusters ({} noise)",
        points.len(),
        labels.iter().filter(|l| l.is_none()).count()
    );

    Ok(best
        .into_iter()
        .flatten()
        .map(|i| LocalMaximum {
            point: points[i],
            weight: weights[i],
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 0.000_03;

    #[test]
    fn isolated_points_are_their_own_clusters() {
        let points = [LatLon::new(0.1, 0.1), LatLon::new(0.2, 0.2), LatLon::new(0.3, 0.3)];
        let maxima = reduce_to_local_maxima(&points, &[0.2, 0.9, 0.5], EPS, 1).unwrap();
        assert_eq!(maxima.len(), 3);
        assert_eq!(maxima[1].point, points[1]);
    }

    #[test]
    fn cluster_keeps_its_heaviest_point() {
        let step = 0.001_f64;
        let points: Vec<LatLon> = (0..4)
            .map(|i| LatLon::new(35.0 + f64::from(i) * step, 51.0))
            .chain([LatLon::new(36.0, 52.0)])
            .collect();
        let weights = [0.1, 0.7, 0.3, 0.2, 0.4];

        // 0.001 degrees is about 1.75e-5 radians.
        let maxima = reduce_to_local_maxima(&points, &weights, EPS, 1).unwrap();
        assert_eq!(maxima.len(), 2);
        assert_eq!(maxima[0].point, points[1]);
        assert!((maxima[0].weight - 0.7).abs() < 1e-12);
        assert_eq!(maxima[1].point, points[4]);
    }

    #[test]
    fn ties_keep_the_first_point() {
        let points = [LatLon::new(35.0, 51.0), LatLon::new(35.001, 51.0)];
        let maxima = reduce_to_local_maxima(&points, &[0.5, 0.5], EPS, 1).unwrap();
        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0].point, points[0]);
    }

    #[test]
    fn noise_is_dropped() {
        let points = [
            LatLon::new(35.0, 51.0),
            LatLon::new(35.001, 51.0),
            LatLon::new(40.0, 40.0),
        ];
        let labels = dbscan(
            &points.iter().map(|p| p.to_radians()).collect::<Vec<_>>(),
            EPS,
            2,
        );
        assert_eq!(labels, vec![Some(0), Some(0), None]);

        let maxima = reduce_to_local_maxima(&points, &[0.1, 0.2, 1.0], EPS, 2).unwrap();
        assert_eq!(maxima.len(), 1);
        assert!((maxima[0].weight - 0.2).abs() < 1e-12);
    }

    #[test]
    fn border_points_join_but_do_not_expand() {
        // a - b - c where only b has two neighbors besides itself.
        let d = 0.000_02_f64.to_degrees();
        let points = [
            LatLon::new(35.0, 51.0),
            LatLon::new(35.0 + d, 51.0),
            LatLon::new(35.0 + 2.0 * d, 51.0),
        ];
        let radians: Vec<(f64, f64)> = points.iter().map(|p| p.to_radians()).collect();
        assert_eq!(dbscan(&radians, EPS, 3), vec![Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        assert!(reduce_to_local_maxima(&[LatLon::new(0.0, 0.0)], &[], EPS, 1).is_err());
        assert!(reduce_to_local_maxima(&[], &[], EPS, 1).unwrap().is_empty());
    }
}
