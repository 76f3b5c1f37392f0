//! Module implementing discrete empirical distributions built from histograms.
//!
//! A [`Distribution`] is an immutable weighted law over a finite set of events.
//! It is built once from a histogram and sampled through inverse-CDF lookup
//! against a single uniform draw, so a fixed seed and draw count always
//! reproduce the same event sequence.
//!
//! # Examples
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rusty_spikes::distribution::Distribution;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let isi = Distribution::build(vec![(0.01, 60.0), (0.02, 100.0), (0.03, 65.0)]).unwrap();
//!
//! let event = isi.sample(&mut rng);
//! assert!(isi.events().contains(&event));
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::SpikeError;

/// An immutable discrete probability law over events, built from a histogram.
///
/// Events are kept sorted and distinct; duplicated histogram entries are merged
/// by summing their weights. Zero-weight events remain visible through the
/// accessors but are never sampled.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Distribution<E = f64> {
    /// The sorted distinct events.
    events: Vec<E>,
    /// The weight of each event, in the same order as `events`.
    weights: Vec<f64>,
    /// The cumulative weights, used for inverse-CDF sampling.
    cumulative: Vec<f64>,
}

impl<E> Distribution<E>
where
    E: Clone + PartialOrd + PartialEq,
{
    /// Create a distribution from a histogram of `(event, weight)` pairs.
    /// The function returns an error for an empty histogram, incomparable
    /// events, non-finite or negative weights, or an all-zero total weight.
    pub fn build(histogram: Vec<(E, f64)>) -> Result<Self, SpikeError> {
        if histogram.is_empty() {
            return Err(SpikeError::InvalidDistribution(
                "The histogram must contain at least one event".to_string(),
            ));
        }

        if histogram.iter().any(|(_, w)| !w.is_finite() || *w < 0.0) {
            return Err(SpikeError::InvalidDistribution(
                "Every weight must be finite and non-negative".to_string(),
            ));
        }

        let mut entries = histogram;
        let mut comparable = true;
        entries.sort_by(|(e1, _), (e2, _)| {
            e1.partial_cmp(e2).unwrap_or_else(|| {
                comparable = false;
                Ordering::Equal
            })
        });
        if !comparable {
            return Err(SpikeError::InvalidDistribution(
                "Events must be totally ordered".to_string(),
            ));
        }

        let mut events: Vec<E> = Vec::with_capacity(entries.len());
        let mut weights: Vec<f64> = Vec::with_capacity(entries.len());
        for (event, weight) in entries {
            match events.last() {
                Some(last) if *last == event => *weights.last_mut().unwrap() += weight,
                _ => {
                    events.push(event);
                    weights.push(weight);
                }
            }
        }

        let cumulative: Vec<f64> = weights
            .iter()
            .scan(0.0, |acc, w| {
                *acc += w;
                Some(*acc)
            })
            .collect();

        if *cumulative.last().unwrap() <= 0.0 {
            return Err(SpikeError::InvalidDistribution(
                "The total weight must be positive".to_string(),
            ));
        }

        Ok(Distribution {
            events,
            weights,
            cumulative,
        })
    }

    /// Draw one event with probability proportional to its weight.
    ///
    /// Draws are independent; the law is never consumed by sampling.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> E {
        let total = *self.cumulative.last().unwrap();
        let u = rng.gen_range(0.0..total);
        let index = self.cumulative.partition_point(|&c| c <= u);
        self.events[index.min(self.events.len() - 1)].clone()
    }

    /// Returns the sorted distinct events of the distribution.
    pub fn events(&self) -> &[E] {
        &self.events[..]
    }

    /// Returns the weight associated with the given event, if any.
    pub fn weight_of(&self, event: &E) -> Option<f64> {
        self.events
            .iter()
            .position(|e| e == event)
            .map(|i| self.weights[i])
    }

    /// Returns the total weight of the distribution.
    pub fn total_weight(&self) -> f64 {
        *self.cumulative.last().unwrap()
    }

    /// Returns the number of distinct events.
    pub fn num_events(&self) -> usize {
        self.events.len()
    }
}

impl Distribution<f64> {
    /// Returns the weighted mean event of the distribution.
    pub fn mean(&self) -> f64 {
        let weighted_sum: f64 = self
            .events
            .iter()
            .zip(self.weights.iter())
            .map(|(e, w)| e * w)
            .sum();
        weighted_sum / self.total_weight()
    }

    /// Returns the smallest event of the distribution.
    pub fn min_event(&self) -> f64 {
        self.events[0]
    }

    /// Returns the largest event of the distribution.
    pub fn max_event(&self) -> f64 {
        *self.events.last().unwrap()
    }
}

/// Evaluate the cubic Hermite basis at `t` for the segment from `(x0, y0)` to
/// `(x1, y1)` with zero tangents at both endpoints.
fn hermite_point(t: f64, p0: (f64, f64), p1: (f64, f64)) -> (f64, f64) {
    let h01 = 3.0 * t * t - 2.0 * t * t * t;
    (
        p0.0 + (p1.0 - p0.0) * h01,
        p0.1 + (p1.1 - p0.1) * h01,
    )
}

const HERMITE_POINTS_PER_SEGMENT: usize = 100;

/// Build a histogram over `[lo, hi]` shaped as a smooth bump peaking at `peak`.
///
/// The bump is two cubic Hermite segments, `(lo, 0) -> (peak, 1)` and
/// `(peak, 1) -> (hi, 0)`, with flat tangents, raised point-wise to `pow_y`
/// and sampled at `bin_size` steps.
pub fn hermite_histogram(
    peak: f64,
    lo: f64,
    hi: f64,
    bin_size: f64,
    pow_y: f64,
) -> Result<Vec<(f64, f64)>, SpikeError> {
    if !(lo < peak && peak < hi) {
        return Err(SpikeError::InvalidParameter(
            "The peak must lie strictly between the bounds".to_string(),
        ));
    }
    if bin_size <= 0.0 || bin_size >= hi - lo {
        return Err(SpikeError::InvalidParameter(
            "The bin size must be positive and smaller than the support".to_string(),
        ));
    }

    // Sample the two segments into a piecewise-linear curve.
    let mut curve: Vec<(f64, f64)> = Vec::with_capacity(2 * HERMITE_POINTS_PER_SEGMENT);
    for (p0, p1) in [((lo, 0.0), (peak, 1.0)), ((peak, 1.0), (hi, 0.0))] {
        for i in 0..HERMITE_POINTS_PER_SEGMENT {
            let t = i as f64 / (HERMITE_POINTS_PER_SEGMENT - 1) as f64;
            let (x, y) = hermite_point(t, p0, p1);
            curve.push((x, y.max(0.0).powf(pow_y)));
        }
    }

    let num_bins = ((hi - lo) / bin_size) as usize + 1;
    let mut histogram: Vec<(f64, f64)> = Vec::with_capacity(num_bins);
    for bin_idx in 0..num_bins {
        let x = lo + bin_idx as f64 * bin_size;
        let j = curve.partition_point(|p| p.0 < x);
        let weight = if j >= curve.len() {
            curve.last().unwrap().1
        } else if j == 0 || curve[j].0 - curve[j - 1].0 < f64::EPSILON {
            curve[j].1
        } else {
            let (x0, y0) = curve[j - 1];
            let (x1, y1) = curve[j];
            y0 + (x - x0) * (y1 - y0) / (x1 - x0)
        };
        histogram.push((x, weight));
    }

    Ok(histogram)
}

const HERMITE_MEAN_MAX_ITERS: usize = 100;

/// Build a hermite-bump distribution over `[lo, hi]` whose mean is within
/// `max_mean_error` of the requested one, by bisecting the peak position.
/// The function returns an error when the requested mean is not reachable.
pub fn hermite_distribution_with_mean(
    mean: f64,
    lo: f64,
    hi: f64,
    max_mean_error: f64,
    bin_size: f64,
    pow_y: f64,
) -> Result<Distribution<f64>, SpikeError> {
    if !(lo < mean && mean < hi) {
        return Err(SpikeError::InvalidParameter(
            "The desired mean must lie strictly between the bounds".to_string(),
        ));
    }
    if max_mean_error <= 0.0 {
        return Err(SpikeError::InvalidParameter(
            "The mean tolerance must be positive".to_string(),
        ));
    }

    // The mean grows monotonically with the peak position.
    let margin = bin_size.min((hi - lo) / 100.0);
    let (mut peak_lo, mut peak_hi) = (lo + margin, hi - margin);
    for _ in 0..HERMITE_MEAN_MAX_ITERS {
        let peak = 0.5 * (peak_lo + peak_hi);
        let distribution = Distribution::build(hermite_histogram(peak, lo, hi, bin_size, pow_y)?)?;
        let error = distribution.mean() - mean;
        if error.abs() <= max_mean_error {
            return Ok(distribution);
        }
        if error > 0.0 {
            peak_hi = peak;
        } else {
            peak_lo = peak;
        }
    }

    Err(SpikeError::InvalidDistribution(format!(
        "No hermite distribution on [{}, {}] reaches mean {} within {}",
        lo, hi, mean, max_mean_error
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SEED: u64 = 42;

    #[test]
    fn test_build_invalid() {
        assert_eq!(
            Distribution::<f64>::build(vec![]),
            Err(SpikeError::InvalidDistribution(
                "The histogram must contain at least one event".to_string()
            ))
        );
        assert_eq!(
            Distribution::build(vec![(1.0, -1.0)]),
            Err(SpikeError::InvalidDistribution(
                "Every weight must be finite and non-negative".to_string()
            ))
        );
        assert_eq!(
            Distribution::build(vec![(1.0, 0.0), (2.0, 0.0)]),
            Err(SpikeError::InvalidDistribution(
                "The total weight must be positive".to_string()
            ))
        );
        assert_eq!(
            Distribution::build(vec![(f64::NAN, 1.0), (2.0, 1.0)]),
            Err(SpikeError::InvalidDistribution(
                "Events must be totally ordered".to_string()
            ))
        );
    }

    #[test]
    fn test_build_sorts_and_merges() {
        let distribution =
            Distribution::build(vec![(3.0, 1.0), (1.0, 2.0), (3.0, 4.0), (2.0, 1.0)]).unwrap();
        assert_eq!(distribution.events(), &[1.0, 2.0, 3.0]);
        assert_eq!(distribution.weight_of(&3.0), Some(5.0));
        assert_eq!(distribution.weight_of(&4.0), None);
        assert_relative_eq!(distribution.total_weight(), 8.0);
    }

    #[test]
    fn test_mean() {
        let distribution = Distribution::build(vec![(10.0, 1.0), (20.0, 3.0)]).unwrap();
        assert_relative_eq!(distribution.mean(), 17.5);
        assert_relative_eq!(distribution.min_event(), 10.0);
        assert_relative_eq!(distribution.max_event(), 20.0);
    }

    #[test]
    fn test_sample_deterministic() {
        let distribution =
            Distribution::build(vec![(1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]).unwrap();
        let mut rng1 = ChaCha8Rng::seed_from_u64(SEED);
        let mut rng2 = ChaCha8Rng::seed_from_u64(SEED);
        let events1: Vec<f64> = (0..1000).map(|_| distribution.sample(&mut rng1)).collect();
        let events2: Vec<f64> = (0..1000).map(|_| distribution.sample(&mut rng2)).collect();
        assert_eq!(events1, events2);
    }

    #[test]
    fn test_sample_point_mass() {
        let distribution = Distribution::build(vec![(0.001, 1.0)]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        assert!((0..100).all(|_| distribution.sample(&mut rng) == 0.001));
    }

    #[test]
    fn test_sample_skips_zero_weight() {
        let distribution =
            Distribution::build(vec![(1.0, 0.0), (2.0, 1.0), (3.0, 0.0)]).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        assert!((0..1000).all(|_| distribution.sample(&mut rng) == 2.0));
    }

    #[test]
    fn test_sample_frequencies() {
        // A skewed multi-bin histogram, heavier on the small events.
        let histogram = vec![
            (10.0, 60.0),
            (20.0, 100.0),
            (30.0, 65.0),
            (40.0, 35.0),
            (50.0, 20.0),
            (60.0, 10.0),
            (70.0, 5.0),
            (80.0, 3.0),
            (90.0, 2.0),
            (100.0, 1.0),
        ];
        let distribution = Distribution::build(histogram.clone()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);

        let num_draws = 100_000;
        let mut counts = vec![0usize; histogram.len()];
        for _ in 0..num_draws {
            let event = distribution.sample(&mut rng);
            let index = histogram.iter().position(|(e, _)| *e == event).unwrap();
            counts[index] += 1;
        }

        let total_weight = distribution.total_weight();
        for ((_, weight), count) in histogram.iter().zip(counts.iter()) {
            let expected = weight / total_weight;
            let observed = *count as f64 / num_draws as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "expected frequency {}, observed {}",
                expected,
                observed
            );
        }
    }

    #[test]
    fn test_categorical_events() {
        let distribution =
            Distribution::build(vec![("noise".to_string(), 75.0), ("regularity".to_string(), 25.0)])
                .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);
        let num_regularity = (0..10_000)
            .filter(|_| distribution.sample(&mut rng) == "regularity")
            .count();
        assert!((num_regularity as f64 / 10_000.0 - 0.25).abs() < 0.02);
    }

    #[test]
    fn test_hermite_histogram_shape() {
        let histogram = hermite_histogram(0.25, 0.05, 0.75, 0.0025, 1.0).unwrap();
        assert!(histogram.iter().all(|(x, w)| *x >= 0.05 && *x <= 0.75 && *w >= 0.0));
        let peak_weight = histogram
            .iter()
            .map(|(_, w)| *w)
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(peak_weight > 0.9 && peak_weight <= 1.0);
    }

    #[test]
    fn test_hermite_distribution_with_mean() {
        for mean in [0.25, 0.4, 0.55] {
            let distribution =
                hermite_distribution_with_mean(mean, 0.05, 0.75, 0.01, 0.0025, 2.0).unwrap();
            assert!((distribution.mean() - mean).abs() <= 0.01);
            assert!(distribution.min_event() >= 0.05);
            assert!(distribution.max_event() <= 0.75);
        }
    }

    #[test]
    fn test_hermite_distribution_invalid_mean() {
        // Outside the support.
        assert!(hermite_distribution_with_mean(0.9, 0.05, 0.75, 0.01, 0.0025, 2.0).is_err());
        // Inside the support but not reachable by any peak position.
        assert!(hermite_distribution_with_mean(0.07, 0.05, 0.75, 0.01, 0.0025, 2.0).is_err());
    }
}
