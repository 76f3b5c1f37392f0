//! Module implementing read-side utilities over recorded spike histories.
//!
//! These helpers turn histories into inter-spike intervals, binned histograms
//! and realized pairwise alignment coefficients; reporting and plotting
//! collaborators consume their output.

use itertools::Itertools;
use std::collections::BTreeMap;

/// Returns the inter-spike intervals of a spike history.
pub fn isi(events: &[f64]) -> Vec<f64> {
    events
        .iter()
        .tuple_windows()
        .map(|(t1, t2)| t2 - t1)
        .collect()
}

/// Bin events into a histogram with the given bin size, anchored at the
/// reference event. Bins are centered by symmetric rounding; the result is
/// sorted by bin value.
pub fn histogram(events: &[f64], bin_size: f64, reference_event: f64) -> Vec<(f64, f64)> {
    debug_assert!(bin_size > 0.0);
    let mut bins: BTreeMap<i64, f64> = BTreeMap::new();
    for &event in events {
        let sign = if event >= 0.0 { 0.5 } else { -0.5 };
        let bin_idx = ((event - reference_event) / bin_size + sign) as i64;
        *bins.entry(bin_idx).or_insert(0.0) += 1.0;
    }
    bins.into_iter()
        .map(|(bin_idx, count)| (reference_event + bin_idx as f64 * bin_size, count))
        .collect()
}

/// Histogram of the realized alignment coefficients of `left` spikes within
/// the `right` gaps enclosing them.
///
/// For every left spike strictly inside a right gap (no other spike of either
/// history interfering within `epsilon`), the position of the left spike
/// within the gap maps to a coefficient in `[-1, 1]`: `-1` on the earlier
/// right spike, `1` on the later one. Both histories must be sorted.
pub fn alignment_histogram(
    left: &[f64],
    right: &[f64],
    bin_size: f64,
    epsilon: f64,
) -> Vec<(f64, f64)> {
    debug_assert!(epsilon >= 0.0);
    let half_epsilon = 0.5 * epsilon;
    let mut coefficients = vec![];
    for i in 0..left.len() {
        let hi = right.partition_point(|&t| t < left[i]);
        if hi == right.len() {
            break;
        }
        if hi == 0 || right[hi] < left[i] + half_epsilon {
            continue;
        }
        let lo = hi - 1;
        if right[lo] > left[i] - half_epsilon {
            continue;
        }
        if i > 0 && left[i - 1] > right[lo] + half_epsilon {
            continue;
        }
        let mut j = i;
        while j + 1 < left.len() && left[j + 1] < right[hi] - half_epsilon {
            j += 1;
        }
        let full_distance = (right[hi] - right[lo]) - (left[j] - left[i]);
        debug_assert!(full_distance >= epsilon);
        let left_distance = left[i] - right[lo];
        debug_assert!(left_distance >= epsilon && left_distance <= full_distance);
        coefficients.push((2.0 * left_distance / full_distance - 1.0).clamp(-1.0, 1.0));
    }
    histogram(&coefficients, bin_size, 0.0)
}

/// Both directions of [`alignment_histogram`] at once.
pub fn alignment_histograms(
    left: &[f64],
    right: &[f64],
    bin_size: f64,
    epsilon: f64,
) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    (
        alignment_histogram(left, right, bin_size, epsilon),
        alignment_histogram(right, left, bin_size, epsilon),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_isi() {
        assert_eq!(isi(&[0.1, 0.3, 0.6, 1.0]), vec![0.2, 0.3, 0.4]);
        assert_eq!(isi(&[0.1]), Vec::<f64>::new());
        assert_eq!(isi(&[]), Vec::<f64>::new());
    }

    #[test]
    fn test_histogram_bins_by_rounding() {
        let events = [0.0, 0.1, 0.12, 0.29, -0.11];
        let histogram = histogram(&events, 0.1, 0.0);
        assert_eq!(
            histogram,
            vec![(-0.1, 1.0), (0.0, 1.0), (0.1, 2.0), (0.30000000000000004, 1.0)]
        );
    }

    #[test]
    fn test_histogram_of_empty_events() {
        assert!(histogram(&[], 0.1, 0.0).is_empty());
    }

    #[test]
    fn test_alignment_histogram_of_shifted_history() {
        // A history shifted by a quarter gap sits at coefficient -0.5 within
        // every enclosing gap.
        let right: Vec<f64> = (1..100).map(|i| i as f64).collect();
        let left: Vec<f64> = right.iter().map(|t| t + 0.25).collect();

        let histogram = alignment_histogram(&left, &right, 0.1, 0.001);
        assert_eq!(histogram.len(), 1);
        let (coefficient, count) = histogram[0];
        assert_relative_eq!(coefficient, -0.5);
        assert_relative_eq!(count, 98.0);
    }

    #[test]
    fn test_alignment_histogram_of_midpoint_history() {
        let right: Vec<f64> = (1..50).map(|i| i as f64).collect();
        let left: Vec<f64> = right.iter().map(|t| t + 0.5).collect();

        let histogram = alignment_histogram(&left, &right, 0.1, 0.001);
        assert_eq!(histogram.len(), 1);
        assert_relative_eq!(histogram[0].0, 0.0);
    }
}
