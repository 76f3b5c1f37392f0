//! Module implementing the alignment of candidate inter-spike intervals to a
//! pivot spike history.
//!
//! The selection function is pure: it looks at a sorted candidate set and a
//! pivot history and returns the index of the candidate best realizing the
//! requested correlation coefficient. Removing the winner from its buffer is
//! the caller's business.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Age-dependent tolerance used when matching a candidate interval against an
/// ideal alignment target.
///
/// The tolerance starts at zero for a freshly drawn candidate and grows with
/// its age, so long-buffered samples match ever more loosely and eventually
/// get consumed.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct AlignmentDispersion {
    exponent: f64,
    scale: f64,
}

impl Default for AlignmentDispersion {
    fn default() -> Self {
        AlignmentDispersion {
            exponent: 2.0,
            scale: 0.5,
        }
    }
}

impl AlignmentDispersion {
    /// Create a dispersion policy with the given exponent and scale.
    pub fn new(exponent: f64, scale: f64) -> Self {
        AlignmentDispersion { exponent, scale }
    }

    /// Returns the matching tolerance for a candidate of the given age.
    pub fn tolerance(&self, age: f64, max_age: f64, max_event: f64) -> f64 {
        (age / max_age).max(0.0).powf(self.exponent) * self.scale * max_event
    }
}

/// Select the candidate event best realizing the requested correlation to the
/// pivot history.
///
/// `events` must be sorted and non-empty, with `creation_times` parallel to it
/// (not checked, for performance). The pivot history must be sorted. The
/// coefficient interpolates the ideal target inside each relevant pivot gap:
/// `-1` aligns to the earlier pivot spike, `1` to the later one, `0` to the
/// midpoint.
///
/// When the pivot history offers no usable target (nothing after
/// `current_time + events[0]`, a collapsed pivot window, or no ideal target
/// past `current_time`), a uniformly random valid index is returned; this is
/// defined fallback behavior, not an error.
#[allow(clippy::too_many_arguments)]
pub fn select_index<R: Rng>(
    events: &[f64],
    creation_times: &[f64],
    mean_event: f64,
    current_time: f64,
    pivot_history: &[f64],
    coefficient: f64,
    dispersion: &AlignmentDispersion,
    rng: &mut R,
) -> usize {
    debug_assert!(!events.is_empty());
    debug_assert_eq!(events.len(), creation_times.len());
    debug_assert!((-1.0..=1.0).contains(&coefficient));

    let mut lo_idx = pivot_history.partition_point(|&t| t < current_time + events[0]);
    if lo_idx >= pivot_history.len() {
        return rng.gen_range(0..events.len());
    }
    if lo_idx > 0 {
        lo_idx -= 1;
    }
    let max_event = *events.last().unwrap();
    let hi_idx = pivot_history
        .partition_point(|&t| t < current_time + max_event)
        .min(pivot_history.len() - 1);
    if lo_idx == hi_idx {
        return rng.gen_range(0..events.len());
    }

    let interpolator = (1.0 + coefficient) / 2.0;
    let ideal_events: Vec<f64> = (lo_idx..hi_idx)
        .filter_map(|i| {
            let target =
                pivot_history[i] + interpolator * (pivot_history[i + 1] - pivot_history[i]);
            (target > current_time).then(|| (target - current_time).max(0.0))
        })
        .collect();
    if ideal_events.is_empty() {
        return rng.gen_range(0..events.len());
    }

    let max_age = mean_event * events.len() as f64;
    let mut best_index = 0;
    let mut best_score = f64::INFINITY;
    for (i, (&event, &created_at)) in events.iter().zip(creation_times.iter()).enumerate() {
        let tolerance = dispersion.tolerance(current_time - created_at, max_age, max_event);
        let mut score = f64::INFINITY;
        for &ideal in ideal_events.iter() {
            let distance = (ideal - event).abs();
            if distance <= tolerance {
                score = 0.0;
                break;
            }
            score = score.min((distance - tolerance).abs());
        }
        // On equal score, the older candidate wins.
        if score < best_score
            || (score == best_score && created_at < creation_times[best_index])
        {
            best_index = i;
            best_score = score;
        }
    }
    best_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const SEED: u64 = 42;

    #[test]
    fn test_dispersion_grows_with_age() {
        let dispersion = AlignmentDispersion::default();
        assert_relative_eq!(dispersion.tolerance(0.0, 10.0, 2.0), 0.0);
        assert_relative_eq!(dispersion.tolerance(5.0, 10.0, 2.0), 0.25);
        assert_relative_eq!(dispersion.tolerance(10.0, 10.0, 2.0), 1.0);
        assert!(dispersion.tolerance(20.0, 10.0, 2.0) > dispersion.tolerance(10.0, 10.0, 2.0));
    }

    #[test]
    fn test_select_monotone_in_coefficient() {
        // One pivot gap straddles the candidate window; the winner must slide
        // from the earlier gap edge to the later one as the coefficient grows.
        let pivot_history = [1.0, 2.0, 3.0];
        let events = [1.0, 1.25, 1.5, 1.75, 2.0];
        let creation_times = [0.0; 5];
        let dispersion = AlignmentDispersion::default();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);

        let selected: Vec<usize> = [-1.0, -0.5, 0.0, 0.5, 1.0]
            .iter()
            .map(|&coefficient| {
                select_index(
                    &events,
                    &creation_times,
                    1.5,
                    0.0,
                    &pivot_history,
                    coefficient,
                    &dispersion,
                    &mut rng,
                )
            })
            .collect();
        assert_eq!(selected, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_select_prefers_candidate_within_tolerance() {
        // The older candidate matches within its (large) tolerance and beats a
        // fresh candidate sitting closer to the ideal target.
        let pivot_history = [1.0, 2.0];
        let events = [1.0, 1.45];
        let creation_times = [-10.0, 0.0];
        let dispersion = AlignmentDispersion::default();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);

        let index = select_index(
            &events,
            &creation_times,
            1.0,
            0.0,
            &pivot_history,
            0.0,
            &dispersion,
            &mut rng,
        );
        assert_eq!(index, 0);
    }

    #[test]
    fn test_select_tie_breaks_on_older_candidate() {
        // Zero dispersion scale, both candidates at the same distance from the
        // ideal target: the earlier creation time wins.
        let pivot_history = [1.0, 2.0];
        let events = [1.4, 1.6];
        let dispersion = AlignmentDispersion::new(2.0, 0.0);
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);

        let index = select_index(
            &events,
            &[0.0, -1.0],
            1.0,
            0.0,
            &pivot_history,
            0.0,
            &dispersion,
            &mut rng,
        );
        assert_eq!(index, 1);

        let index = select_index(
            &events,
            &[-1.0, 0.0],
            1.0,
            0.0,
            &pivot_history,
            0.0,
            &dispersion,
            &mut rng,
        );
        assert_eq!(index, 0);
    }

    #[test]
    fn test_select_fallback_is_uniform() {
        // Exhausted pivot history: every index must come up with roughly equal
        // frequency.
        let pivot_history = [0.1, 0.2];
        let events = [1.0, 2.0, 3.0, 4.0, 5.0];
        let creation_times = [10.0; 5];
        let dispersion = AlignmentDispersion::default();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);

        let num_draws = 10_000;
        let mut counts = [0usize; 5];
        for _ in 0..num_draws {
            let index = select_index(
                &events,
                &creation_times,
                3.0,
                10.0,
                &pivot_history,
                0.5,
                &dispersion,
                &mut rng,
            );
            counts[index] += 1;
        }

        let expected = num_draws as f64 / events.len() as f64;
        let chi_square: f64 = counts
            .iter()
            .map(|&c| (c as f64 - expected).powi(2) / expected)
            .sum();
        // 4 degrees of freedom, far below the 0.999 quantile (18.47).
        assert!(chi_square < 18.47, "chi-square statistic {}", chi_square);
    }

    #[test]
    fn test_select_fallback_on_collapsed_window() {
        // A single usable pivot point collapses the window.
        let pivot_history = [1.5];
        let events = [1.0, 2.0];
        let creation_times = [0.0, 0.0];
        let dispersion = AlignmentDispersion::default();
        let mut rng = ChaCha8Rng::seed_from_u64(SEED);

        let index = select_index(
            &events,
            &creation_times,
            1.5,
            0.0,
            &pivot_history,
            1.0,
            &dispersion,
            &mut rng,
        );
        assert!(index < events.len());
    }
}
