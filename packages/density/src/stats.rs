//! Normalization and percentile helpers shared by the pipeline stages.

/// Value assigned to every entry when min-max scaling is undefined
/// (all inputs equal).
pub const DEGENERATE_NORMALIZED_VALUE: f64 = 0.5;

/// Min-max scales `values` into `[0, 1]`.
///
/// When every value is equal (including a single value) the scaling is
/// undefined and each entry becomes [`DEGENERATE_NORMALIZED_VALUE`].
/// Non-finite inputs are treated as missing and map to `0.0`.
#[must_use]
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if !min.is_finite() {
        return vec![0.0; values.len()];
    }

    let range = max - min;
    if range <= 0.0 {
        return vec![DEGENERATE_NORMALIZED_VALUE; values.len()];
    }

    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                ((v - min) / range).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// The `q`-th percentile (`0..=100`) using linear interpolation between
/// the closest ranks, over the non-negative entries of `values`.
///
/// Returns `None` if there are no non-negative entries.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| *v >= 0.0).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    Some((sorted[hi] - sorted[lo]).mul_add(frac, sorted[lo]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_hits_both_ends() {
        let n = min_max_normalize(&[2.0, 4.0, 3.0]);
        assert_eq!(n, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn normalize_degenerate_is_uniform() {
        assert_eq!(min_max_normalize(&[7.0, 7.0]), vec![0.5, 0.5]);
        assert_eq!(min_max_normalize(&[1.0]), vec![0.5]);
        assert!(min_max_normalize(&[]).is_empty());
    }

    #[test]
    fn normalize_ignores_non_finite() {
        let n = min_max_normalize(&[0.0, f64::NAN, 2.0]);
        assert_eq!(n, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn percentile_interpolates_linearly() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.0), Some(1.0));
        assert_eq!(percentile(&values, 100.0), Some(4.0));
        assert!((percentile(&values, 50.0).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn percentile_skips_negative_values() {
        assert_eq!(percentile(&[-5.0, 1.0, 3.0], 0.0), Some(1.0));
        assert_eq!(percentile(&[-1.0], 50.0), None);
    }
}
