//! Module implementing a spike train driven by correlation to a pivot train.
//!
//! Unlike [`SpikeTrain`](crate::spike_train::SpikeTrain), which draws its
//! intervals from a local distribution and optionally re-selects them against
//! a pivot history, a [`CorrelatingSpikeTrain`] feeds its buffer directly with
//! the *gaps between successive pivot spikes*, so every candidate interval is
//! a genuine pivot-derived one. The alignment engine then chooses which gap to
//! consume under a correlation coefficient freshly drawn each step from a
//! deviation distribution.

use log::trace;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};

use crate::alignment::{self, AlignmentDispersion};
use crate::distribution::Distribution;
use crate::error::SpikeError;
use crate::spike_train::SpikeTrain;

/// A pivot gap waiting in the buffer, remembering when it was inserted.
#[derive(Debug, PartialEq, Clone, Copy)]
struct BufferedGap {
    gap: f64,
    created_at: f64,
}

/// A generator whose inter-spike intervals are pivot gaps chosen by the
/// alignment engine.
#[derive(Debug)]
pub struct CorrelatingSpikeTrain {
    /// The owned pivot generator, stepped lazily in its own time. It must
    /// record every spike it emits.
    pivot: SpikeTrain,
    /// Per-step correlation coefficients, with support inside `[-1, 1]`.
    deviation: Distribution<f64>,
    dispersion: AlignmentDispersion,
    /// Sorted (by gap) pivot gaps not yet consumed.
    buffer: Vec<BufferedGap>,
    max_buffer_size: usize,
    /// Index of the first pivot spike whose gap has not been buffered yet.
    next_pivot_index: usize,
    next_spike_time: Option<f64>,
    spikes_history: Vec<f64>,
    rng: ChaCha8Rng,
}

impl CorrelatingSpikeTrain {
    /// Create a correlating spike train with the specified parameters.
    /// The function returns an error for a deviation distribution with
    /// support outside `[-1, 1]` or an empty buffer size.
    pub fn build(
        pivot: SpikeTrain,
        deviation: Distribution<f64>,
        max_buffer_size: usize,
        dispersion: AlignmentDispersion,
        seed: u64,
    ) -> Result<Self, SpikeError> {
        if deviation.min_event() < -1.0 || deviation.max_event() > 1.0 {
            return Err(SpikeError::InvalidParameter(
                "The deviation distribution support must lie in [-1, 1]".to_string(),
            ));
        }
        if max_buffer_size < 1 {
            return Err(SpikeError::InvalidParameter(
                "The gap buffer must hold at least one sample".to_string(),
            ));
        }

        Ok(CorrelatingSpikeTrain {
            pivot,
            deviation,
            dispersion,
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            next_pivot_index: 0,
            next_spike_time: None,
            spikes_history: vec![],
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Advance the generator through the step `(t, t + dt]` and report whether
    /// a spike was emitted in it.
    ///
    /// The first call only initializes the train (and its pivot); spikes are
    /// reported from the second call onward.
    pub fn advance(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError> {
        let (current_time, spiked) = match self.next_spike_time {
            None => {
                if self.pivot.next_spike_time().is_none() {
                    self.pivot.advance(t, dt)?;
                }
                (t, false)
            }
            Some(time) if time > t + 1.5 * dt => return Ok(false),
            Some(time) => {
                self.spikes_history.push(t + dt);
                (time, true)
            }
        };

        self.refill_buffer(t, dt, current_time)?;

        let events: Vec<f64> = self.buffer.iter().map(|b| b.gap).collect();
        let creation_times: Vec<f64> = self.buffer.iter().map(|b| b.created_at).collect();
        let mean_gap = events.iter().sum::<f64>() / events.len() as f64;
        let coefficient = self.deviation.sample(&mut self.rng);
        let index = alignment::select_index(
            &events,
            &creation_times,
            mean_gap,
            current_time,
            self.pivot.spikes_history(),
            coefficient,
            &self.dispersion,
            &mut self.rng,
        );
        let gap = self.buffer.remove(index).gap;
        trace!("consuming pivot gap {} under coefficient {}", gap, coefficient);

        let next_spike_time = current_time + gap;
        if next_spike_time <= current_time {
            return Err(SpikeError::CorruptedState(format!(
                "The next spike time {} does not advance past {}",
                next_spike_time, current_time
            )));
        }
        self.next_spike_time = Some(next_spike_time);
        Ok(spiked)
    }

    /// Refill the gap buffer, lazily stepping the pivot ahead as needed.
    fn refill_buffer(&mut self, t: f64, dt: f64, current_time: f64) -> Result<(), SpikeError> {
        while self.buffer.len() < self.max_buffer_size {
            while self.next_pivot_index >= self.pivot.spikes_history().len() {
                self.step_pivot_to_next_spike(t, dt)?;
            }
            let history = self.pivot.spikes_history();
            let previous = match self.next_pivot_index {
                0 => 0.0,
                i => history[i - 1],
            };
            let gap = history[self.next_pivot_index] - previous;
            self.next_pivot_index += 1;
            if gap <= 0.0 {
                return Err(SpikeError::CorruptedState(format!(
                    "The pivot history yields a non-positive gap {}",
                    gap
                )));
            }
            let index = self.buffer.partition_point(|b| b.gap < gap);
            self.buffer.insert(
                index,
                BufferedGap {
                    gap,
                    created_at: current_time,
                },
            );
        }
        Ok(())
    }

    /// Step the pivot, in its own time, up to its next scheduled spike.
    fn step_pivot_to_next_spike(&mut self, t: f64, dt: f64) -> Result<(), SpikeError> {
        let scheduled = self.pivot.next_spike_time().ok_or_else(|| {
            SpikeError::CorruptedState("The pivot has not been initialized".to_string())
        })?;
        let mut t0 = t;
        while t0 + dt < scheduled {
            t0 += dt;
        }
        let num_recorded = self.pivot.spikes_history().len();
        self.pivot.advance(t0, dt)?;
        if self.pivot.spikes_history().len() != num_recorded + 1 {
            return Err(SpikeError::CorruptedState(
                "The pivot did not record its spike; correlating trains require a pivot \
                 recording every spike"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the recorded spike times, in increasing order.
    pub fn spikes_history(&self) -> &[f64] {
        &self.spikes_history[..]
    }

    /// Returns the scheduled time of the next spike, once initialized.
    pub fn next_spike_time(&self) -> Option<f64> {
        self.next_spike_time
    }

    /// Returns the pivot generator.
    pub fn pivot(&self) -> &SpikeTrain {
        &self.pivot
    }
}
