//! This crate provides tools for generating stochastic spike trains in Rust.
//!
//! A spike train is a sequence of event times whose inter-spike intervals
//! (ISIs) reproduce a prescribed empirical [`distribution::Distribution`].
//! On top of the marginal law, two kinds of temporal structure can be
//! injected without distorting it:
//!
//! - **regularity phases**: time windows in which intervals are drawn from a
//!   contiguous chunk of the sorted sample buffer, correlating nearby
//!   intervals ([`spike_train::SpikeTrain`]);
//! - **alignment**: selection of the next interval so that the emitted spikes
//!   correlate with a second, independently generated *pivot* train
//!   ([`alignment`], [`correlating::CorrelatingSpikeTrain`]).
//!
//! # Generating a Spike Train
//!
//! ```rust
//! use rusty_spikes::distribution::Distribution;
//! use rusty_spikes::spike_train::{RecordAll, SpikeTrain};
//!
//! let isi = Distribution::build(vec![(0.01, 2.0), (0.02, 5.0), (0.03, 3.0)]).unwrap();
//! let phase_lengths = Distribution::build(vec![(0.25, 1.0)]).unwrap();
//!
//! let mut train = SpikeTrain::build(
//!     isi,
//!     25.0,                    // percentage of time spent in regularity phases
//!     phase_lengths.clone(),
//!     phase_lengths,
//!     100,                     // buffer size, the correlation-control knob
//!     17,                      // regularity chunk size
//!     Box::new(RecordAll),
//!     42,
//! )
//! .unwrap();
//!
//! let dt = 0.001;
//! let mut t = 0.0;
//! for _ in 0..10_000 {
//!     train.advance(t, dt).unwrap();
//!     t += dt;
//! }
//! assert!(!train.spikes_history().is_empty());
//! ```
//!
//! # Aligning to a Pivot Train
//!
//! ```rust
//! use std::sync::Arc;
//! use rusty_spikes::alignment::AlignmentDispersion;
//! use rusty_spikes::distribution::Distribution;
//! use rusty_spikes::simulator::run;
//! use rusty_spikes::spike_train::{RecordAll, SpikeTrain};
//!
//! let isi = Distribution::build(vec![(0.01, 1.0), (0.02, 1.0), (0.03, 1.0)]).unwrap();
//! let phase_lengths = Distribution::build(vec![(0.25, 1.0)]).unwrap();
//! let build = |seed| {
//!     SpikeTrain::build(
//!         isi.clone(),
//!         0.0,
//!         phase_lengths.clone(),
//!         phase_lengths.clone(),
//!         100,
//!         17,
//!         Box::new(RecordAll),
//!         seed,
//!     )
//!     .unwrap()
//! };
//!
//! // Simulate the pivot first, then bind its history to a second train.
//! let mut pivot = build(1);
//! run(std::slice::from_mut(&mut pivot), 0.0, 10_000, 0.001).unwrap();
//! let pivot_history = Arc::new(pivot.spikes_history().to_vec());
//!
//! let mut aligned = build(2);
//! aligned
//!     .align_to(pivot_history, 0.75, AlignmentDispersion::default())
//!     .unwrap();
//! run(std::slice::from_mut(&mut aligned), 0.0, 10_000, 0.001).unwrap();
//! ```

pub mod alignment;
pub mod analysis;
pub mod correlating;
pub mod distribution;
pub mod error;
pub mod simulator;
pub mod spike_train;

/// The smallest admissible inter-spike interval. Sampling anything at or
/// below it corrupts the generator state.
pub const MIN_ISI: f64 = 1e-5;
/// The default size of the not-yet-consumed sample buffer. Values in 75..150
/// give good correlation degrees.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100;
/// The default width of the regularity chunk window.
pub const DEFAULT_CHUNK_SIZE: usize = 17;
/// The mean tolerance used when building phase-duration distributions.
pub const PHASE_DURATION_MEAN_ERROR: f64 = 0.01;
/// The bin size used when building phase-duration distributions.
pub const PHASE_DURATION_BIN_SIZE: f64 = 0.0025;
