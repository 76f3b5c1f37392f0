//! Module implementing the phase-driven stochastic spike-train generator.
//!
//! A [`SpikeTrain`] produces a sequence of spike times whose inter-spike
//! intervals (ISIs) reproduce a prescribed [`Distribution`], while alternating
//! between *noise* phases (minimally correlated draws) and *regularity* phases
//! (draws confined to a contiguous chunk of the sorted sample buffer, which
//! correlates nearby intervals). Buffering and chunk selection only reorder
//! which already-drawn sample is emitted next; they never fabricate or discard
//! samples, so the marginal ISI distribution is preserved regardless of the
//! correlation settings.
//!
//! # Examples
//!
//! ```rust
//! use rusty_spikes::distribution::Distribution;
//! use rusty_spikes::spike_train::{RecordAll, SpikeTrain};
//!
//! let isi = Distribution::build(vec![(0.01, 1.0), (0.02, 2.0), (0.03, 1.0)]).unwrap();
//! let lengths = Distribution::build(vec![(0.25, 1.0)]).unwrap();
//! let mut train = SpikeTrain::build(
//!     isi,
//!     25.0,
//!     lengths.clone(),
//!     lengths,
//!     100,
//!     17,
//!     Box::new(RecordAll),
//!     42,
//! )
//! .unwrap();
//!
//! let mut t = 0.0;
//! let dt = 0.001;
//! for _ in 0..1000 {
//!     train.advance(t, dt).unwrap();
//!     t += dt;
//! }
//! assert!(!train.spikes_history().is_empty());
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use serde::{Deserialize, Serialize};

use crate::alignment::{self, AlignmentDispersion};
use crate::distribution::{hermite_distribution_with_mean, Distribution};
use crate::error::SpikeError;
use crate::{MIN_ISI, PHASE_DURATION_BIN_SIZE, PHASE_DURATION_MEAN_ERROR};

/// The operating mode of the generator within the current phase window.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
pub enum Phase {
    /// Minimally correlated draws: one sample in, one sample out.
    Noise,
    /// Locally correlated draws from a contiguous chunk of the sorted buffer.
    Regularity,
}

/// Decides whether a just-emitted spike is appended to the recorded history.
///
/// The generative process is identical under every policy; recording only
/// gates what downstream consumers get to see.
pub trait RecordingPolicy: fmt::Debug + Send {
    /// `last_recording_time` is the last time this policy approved a
    /// recording (the simulation start until then); `current_time` is the end
    /// of the current step.
    fn should_record(&mut self, last_recording_time: f64, current_time: f64) -> bool;
}

/// Records every generated spike.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RecordAll;

impl RecordingPolicy for RecordAll {
    fn should_record(&mut self, _last_recording_time: f64, _current_time: f64) -> bool {
        true
    }
}

/// Disables recording entirely.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RecordNothing;

impl RecordingPolicy for RecordNothing {
    fn should_record(&mut self, _last_recording_time: f64, _current_time: f64) -> bool {
        false
    }
}

/// Records at most one spike per `period` of simulated time.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct RecordWithPeriod {
    pub period: f64,
}

impl RecordingPolicy for RecordWithPeriod {
    fn should_record(&mut self, last_recording_time: f64, current_time: f64) -> bool {
        current_time - last_recording_time >= self.period
    }
}

/// Diagnostic counters of a [`SpikeTrain`]. No correctness dependency.
#[derive(Debug, Default, PartialEq, Clone, Serialize)]
pub struct SpikeTrainStatistics {
    /// Samples drawn from the spiking distribution into the buffer.
    pub num_generated_events: usize,
    /// Spikes submitted to the recording policy.
    pub num_recording_decisions: usize,
    /// Spikes the policy let through to the history.
    pub num_recorded_spikes: usize,
    pub num_noise_phases: usize,
    pub num_regularity_phases: usize,
    /// Summed lengths the noise phases were opened with.
    pub desired_noise_phases_duration: f64,
    /// Summed lengths the noise phases actually lasted (a phase closes on the
    /// first spike past its end).
    pub realized_noise_phases_duration: f64,
    pub desired_regularity_phases_duration: f64,
    pub realized_regularity_phases_duration: f64,
    pub num_advance_calls: usize,
    pub num_recharge_calls: usize,
    /// Wall-clock seconds spent in `advance`.
    pub time_in_advance: f64,
}

/// A serializable snapshot of the construction parameters, for reports.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct SpikeTrainConfiguration {
    pub spiking_distribution_mean: f64,
    pub percentage_of_regularity_phases: f64,
    pub noise_phase_min_duration: f64,
    pub noise_phase_max_duration: f64,
    pub noise_phase_mean_duration: f64,
    pub regularity_phase_min_duration: f64,
    pub regularity_phase_max_duration: f64,
    pub regularity_phase_mean_duration: f64,
    pub max_buffer_size: usize,
    pub chunk_size: usize,
}

/// An ISI sample waiting in the buffer, remembering when it was drawn.
#[derive(Debug, PartialEq, Clone, Copy)]
struct BufferedIsi {
    isi: f64,
    created_at: f64,
}

/// Binds the generator to a pivot spike history.
#[derive(Debug, Clone)]
struct AlignmentBinding {
    pivot_history: Arc<Vec<f64>>,
    coefficient: f64,
    dispersion: AlignmentDispersion,
}

/// The phase-driven spike-train generator.
#[derive(Debug)]
pub struct SpikeTrain {
    spiking_distribution: Distribution<f64>,
    phases_distribution: Distribution<Phase>,
    noise_length_distribution: Distribution<f64>,
    regularity_length_distribution: Distribution<f64>,
    percentage_of_regularity_phases: f64,
    max_buffer_size: usize,
    chunk_size: usize,
    /// Sorted (by interval) samples drawn but not yet consumed.
    buffer: Vec<BufferedIsi>,
    /// The regularity chunk window `(low, high)` into the buffer. `None` means
    /// no chunk has been opened since the current phase started; an empty
    /// window means the previous chunk is exhausted.
    chunk: Option<(usize, usize)>,
    phase: Phase,
    phase_start_time: f64,
    phase_end_time: f64,
    next_spike_time: Option<f64>,
    last_recording_time: f64,
    spikes_history: Vec<f64>,
    recording_policy: Box<dyn RecordingPolicy>,
    alignment: Option<AlignmentBinding>,
    statistics: SpikeTrainStatistics,
    rng: ChaCha8Rng,
}

impl SpikeTrain {
    /// Create a spike train with the specified parameters.
    /// The function returns an error for invalid parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        spiking_distribution: Distribution<f64>,
        percentage_of_regularity_phases: f64,
        noise_length_distribution: Distribution<f64>,
        regularity_length_distribution: Distribution<f64>,
        max_buffer_size: usize,
        chunk_size: usize,
        recording_policy: Box<dyn RecordingPolicy>,
        seed: u64,
    ) -> Result<Self, SpikeError> {
        if !(0.0..=100.0).contains(&percentage_of_regularity_phases) {
            return Err(SpikeError::InvalidParameter(
                "The percentage of regularity phases must be in [0, 100]".to_string(),
            ));
        }
        if spiking_distribution.min_event() <= MIN_ISI {
            return Err(SpikeError::InvalidParameter(format!(
                "The spiking distribution support must be strictly positive (> {})",
                MIN_ISI
            )));
        }
        if noise_length_distribution.mean() <= 0.0 {
            return Err(SpikeError::InvalidParameter(
                "The noise phase length distribution must have a positive mean".to_string(),
            ));
        }
        if regularity_length_distribution.mean() <= 0.0 {
            return Err(SpikeError::InvalidParameter(
                "The regularity phase length distribution must have a positive mean".to_string(),
            ));
        }
        if max_buffer_size < 1 {
            return Err(SpikeError::InvalidParameter(
                "The spikes buffer must hold at least one sample".to_string(),
            ));
        }
        if chunk_size < 1 || chunk_size >= max_buffer_size {
            return Err(SpikeError::InvalidParameter(
                "The regularity chunk size must be in [1, max_buffer_size)".to_string(),
            ));
        }

        let phases_distribution = Distribution::build(vec![
            (Phase::Noise, 100.0 - percentage_of_regularity_phases),
            (Phase::Regularity, percentage_of_regularity_phases),
        ])?;

        Ok(SpikeTrain {
            spiking_distribution,
            phases_distribution,
            noise_length_distribution,
            regularity_length_distribution,
            percentage_of_regularity_phases,
            max_buffer_size,
            chunk_size,
            buffer: Vec::with_capacity(max_buffer_size),
            chunk: None,
            phase: Phase::Noise,
            phase_start_time: 0.0,
            phase_end_time: 0.0,
            next_spike_time: None,
            last_recording_time: 0.0,
            spikes_history: vec![],
            recording_policy,
            alignment: None,
            statistics: SpikeTrainStatistics::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    /// Create a spike train from `(min, mean, max)` phase-duration triples,
    /// building both phase-length distributions as hermite bumps with the
    /// requested means, and the default buffer and chunk sizes.
    pub fn with_phase_durations(
        spiking_distribution: Distribution<f64>,
        percentage_of_regularity_phases: f64,
        noise_phase_durations: (f64, f64, f64),
        regularity_phase_durations: (f64, f64, f64),
        recording_policy: Box<dyn RecordingPolicy>,
        seed: u64,
    ) -> Result<Self, SpikeError> {
        let (noise_min, noise_mean, noise_max) = noise_phase_durations;
        let (regularity_min, regularity_mean, regularity_max) = regularity_phase_durations;
        Self::build(
            spiking_distribution,
            percentage_of_regularity_phases,
            hermite_distribution_with_mean(
                noise_mean,
                noise_min,
                noise_max,
                PHASE_DURATION_MEAN_ERROR,
                PHASE_DURATION_BIN_SIZE,
                2.0,
            )?,
            hermite_distribution_with_mean(
                regularity_mean,
                regularity_min,
                regularity_max,
                PHASE_DURATION_MEAN_ERROR,
                PHASE_DURATION_BIN_SIZE,
                2.0,
            )?,
            crate::DEFAULT_MAX_BUFFER_SIZE,
            crate::DEFAULT_CHUNK_SIZE,
            recording_policy,
            seed,
        )
    }

    /// Bind the generator to a pivot spike history, effective from the next
    /// call to [`advance`](Self::advance) onward: the buffered sample consumed
    /// at each spike is then chosen by the alignment engine instead of
    /// uniformly at random.
    /// The function returns an error for a coefficient outside `[-1, 1]`.
    pub fn align_to(
        &mut self,
        pivot_history: Arc<Vec<f64>>,
        coefficient: f64,
        dispersion: AlignmentDispersion,
    ) -> Result<(), SpikeError> {
        if !(-1.0..=1.0).contains(&coefficient) {
            return Err(SpikeError::InvalidParameter(
                "The alignment coefficient must be in [-1, 1]".to_string(),
            ));
        }
        self.alignment = Some(AlignmentBinding {
            pivot_history,
            coefficient,
            dispersion,
        });
        Ok(())
    }

    /// Advance the generator through the step `(t, t + dt]` and report whether
    /// a spike was emitted in it.
    ///
    /// A [`SpikeError::CorruptedState`] is fatal: it signals a misconfigured
    /// distribution (e.g., a length distribution whose support does not clear
    /// the time step) and the run must be aborted.
    pub fn advance(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError> {
        let started = Instant::now();
        let result = self.step(t, dt);
        self.statistics.time_in_advance += started.elapsed().as_secs_f64();
        result
    }

    fn step(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError> {
        self.statistics.num_advance_calls += 1;
        let next_spike_time = match self.next_spike_time {
            Some(time) => time,
            None => {
                let time = t + self.noise_sample(t)?;
                self.phase_start_time = t;
                self.phase_end_time = t + self.noise_length_distribution.sample(&mut self.rng);
                self.last_recording_time = t;
                self.next_spike_time = Some(time);
                time
            }
        };
        debug_assert_eq!(
            self.statistics.num_generated_events,
            1 + self.buffer.len() + self.statistics.num_recording_decisions
        );

        if next_spike_time > t + dt {
            return Ok(false);
        }

        self.do_recording(t, dt, next_spike_time);

        if self.phase_end_time <= next_spike_time {
            self.close_phase(next_spike_time);
            self.phase = self.phases_distribution.sample(&mut self.rng);
            self.phase_start_time = next_spike_time;
            let length = match self.phase {
                Phase::Noise => self.noise_length_distribution.sample(&mut self.rng),
                Phase::Regularity => self.regularity_length_distribution.sample(&mut self.rng),
            };
            self.phase_end_time = self.phase_start_time + length;
            if self.phase_end_time <= t + dt {
                return Err(SpikeError::CorruptedState(format!(
                    "The new {:?} phase ends at {}, which does not reach past {}",
                    self.phase,
                    self.phase_end_time,
                    t + dt
                )));
            }
            self.chunk = None;
            debug!(
                "entering {:?} phase [{}, {})",
                self.phase, self.phase_start_time, self.phase_end_time
            );
        }

        let isi = match self.phase {
            Phase::Noise => self.noise_sample(next_spike_time)?,
            Phase::Regularity => self.regularity_sample(next_spike_time)?,
        };
        let new_next_spike_time = next_spike_time + isi;
        self.next_spike_time = Some(new_next_spike_time);
        if new_next_spike_time <= t + dt {
            return Err(SpikeError::CorruptedState(format!(
                "The next spike time {} does not advance past {}",
                new_next_spike_time,
                t + dt
            )));
        }
        Ok(true)
    }

    /// Pop one sample from a buffer recharged to hold at least one.
    fn noise_sample(&mut self, current_time: f64) -> Result<f64, SpikeError> {
        let desired_size = match self.alignment {
            // The alignment engine needs a candidate set to choose from.
            Some(_) => self.max_buffer_size,
            None => 1,
        };
        self.recharge_buffer(desired_size, current_time)?;
        let index = self.select_within(0, self.buffer.len(), current_time);
        Ok(self.buffer.remove(index).isi)
    }

    /// Pop one sample from within the current regularity chunk, opening a new
    /// chunk over a fully recharged buffer when none is open.
    fn regularity_sample(&mut self, current_time: f64) -> Result<f64, SpikeError> {
        let needs_new_chunk = match self.chunk {
            Some((low, high)) => low == high,
            None => true,
        };
        if needs_new_chunk {
            self.recharge_buffer(self.max_buffer_size, current_time)?;
            let anchor = match self.chunk {
                // A chunk existed in this phase: re-anchor at the insertion
                // point of the current time into the sorted buffer.
                Some(_) => self.buffer.partition_point(|b| b.isi < current_time),
                None => self.rng.gen_range(0..self.buffer.len()),
            };
            let (mut low, mut high) = (anchor, anchor);
            while high - low < self.chunk_size {
                if low == 0 {
                    high += 1;
                } else if high == self.buffer.len() {
                    low -= 1;
                } else if self.rng.gen::<f64>() < 0.5 {
                    low -= 1;
                } else {
                    high += 1;
                }
            }
            debug_assert!(high <= self.buffer.len());
            self.chunk = Some((low, high));
            trace!("opened regularity chunk [{}, {})", low, high);
        }

        let (low, high) = self.chunk.unwrap();
        debug_assert!(low < high);
        let index = self.select_within(low, high, current_time);
        let event = self.buffer.remove(index).isi;
        self.chunk = Some((low, high - 1));
        Ok(event)
    }

    /// Choose the buffer index to consume within `[low, high)`: uniformly at
    /// random, or through the alignment engine when a pivot is bound.
    fn select_within(&mut self, low: usize, high: usize, current_time: f64) -> usize {
        match &self.alignment {
            Some(binding) => {
                let window = &self.buffer[low..high];
                let events: Vec<f64> = window.iter().map(|b| b.isi).collect();
                let creation_times: Vec<f64> = window.iter().map(|b| b.created_at).collect();
                low + alignment::select_index(
                    &events,
                    &creation_times,
                    self.spiking_distribution.mean(),
                    current_time,
                    binding.pivot_history.as_slice(),
                    binding.coefficient,
                    &binding.dispersion,
                    &mut self.rng,
                )
            }
            None => self.rng.gen_range(low..high),
        }
    }

    /// Refill the buffer from the spiking distribution, keeping it sorted.
    /// This is the only path that consumes the spiking distribution.
    fn recharge_buffer(
        &mut self,
        desired_size: usize,
        current_time: f64,
    ) -> Result<(), SpikeError> {
        debug_assert!(desired_size >= 1);
        self.statistics.num_recharge_calls += 1;
        while self.buffer.len() < desired_size {
            let isi = self.spiking_distribution.sample(&mut self.rng);
            if isi <= MIN_ISI {
                return Err(SpikeError::CorruptedState(format!(
                    "Sampled inter-spike interval {} is not strictly positive",
                    isi
                )));
            }
            let index = self.buffer.partition_point(|b| b.isi < isi);
            self.buffer.insert(
                index,
                BufferedIsi {
                    isi,
                    created_at: current_time,
                },
            );
            self.statistics.num_generated_events += 1;
        }
        trace!("buffer recharged to {} samples", self.buffer.len());
        Ok(())
    }

    fn do_recording(&mut self, t: f64, dt: f64, spike_time: f64) {
        debug_assert!(spike_time <= t + dt);
        self.statistics.num_recording_decisions += 1;
        if self
            .recording_policy
            .should_record(self.last_recording_time, t + dt)
        {
            self.last_recording_time = t + dt;
            self.spikes_history.push(spike_time);
            self.statistics.num_recorded_spikes += 1;
        }
    }

    fn close_phase(&mut self, spike_time: f64) {
        let desired = self.phase_end_time - self.phase_start_time;
        let realized = spike_time - self.phase_start_time;
        match self.phase {
            Phase::Noise => {
                self.statistics.num_noise_phases += 1;
                self.statistics.desired_noise_phases_duration += desired;
                self.statistics.realized_noise_phases_duration += realized;
            }
            Phase::Regularity => {
                self.statistics.num_regularity_phases += 1;
                self.statistics.desired_regularity_phases_duration += desired;
                self.statistics.realized_regularity_phases_duration += realized;
            }
        }
    }

    /// Returns the recorded spike times, in increasing order.
    pub fn spikes_history(&self) -> &[f64] {
        &self.spikes_history[..]
    }

    /// Returns the scheduled time of the next spike, once initialized.
    pub fn next_spike_time(&self) -> Option<f64> {
        self.next_spike_time
    }

    /// Returns the phase the generator currently operates in.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the distribution the inter-spike intervals are drawn from.
    pub fn spiking_distribution(&self) -> &Distribution<f64> {
        &self.spiking_distribution
    }

    /// Returns the generation statistics.
    pub fn statistics(&self) -> &SpikeTrainStatistics {
        &self.statistics
    }

    /// Returns a serializable snapshot of the construction parameters.
    pub fn configuration(&self) -> SpikeTrainConfiguration {
        SpikeTrainConfiguration {
            spiking_distribution_mean: self.spiking_distribution.mean(),
            percentage_of_regularity_phases: self.percentage_of_regularity_phases,
            noise_phase_min_duration: self.noise_length_distribution.min_event(),
            noise_phase_max_duration: self.noise_length_distribution.max_event(),
            noise_phase_mean_duration: self.noise_length_distribution.mean(),
            regularity_phase_min_duration: self.regularity_length_distribution.min_event(),
            regularity_phase_max_duration: self.regularity_length_distribution.max_event(),
            regularity_phase_mean_duration: self.regularity_length_distribution.mean(),
            max_buffer_size: self.max_buffer_size,
            chunk_size: self.chunk_size,
        }
    }
}
