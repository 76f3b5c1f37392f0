//! Module implementing flat-loop drivers stepping many generators through a
//! fixed time grid.

use log::info;
use rayon::prelude::*;

use crate::correlating::CorrelatingSpikeTrain;
use crate::error::SpikeError;
use crate::spike_train::SpikeTrain;

/// The stepping seam shared by every generator in this crate.
pub trait SpikeGenerator: Send {
    /// Advance through the step `(t, t + dt]`, reporting whether a spike was
    /// emitted in it.
    fn advance(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError>;

    /// The scheduled time of the next spike, once initialized.
    fn next_spike_time(&self) -> Option<f64>;

    /// The recorded spike times.
    fn spikes_history(&self) -> &[f64];
}

impl SpikeGenerator for SpikeTrain {
    fn advance(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError> {
        SpikeTrain::advance(self, t, dt)
    }

    fn next_spike_time(&self) -> Option<f64> {
        SpikeTrain::next_spike_time(self)
    }

    fn spikes_history(&self) -> &[f64] {
        SpikeTrain::spikes_history(self)
    }
}

impl SpikeGenerator for CorrelatingSpikeTrain {
    fn advance(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError> {
        CorrelatingSpikeTrain::advance(self, t, dt)
    }

    fn next_spike_time(&self) -> Option<f64> {
        CorrelatingSpikeTrain::next_spike_time(self)
    }

    fn spikes_history(&self) -> &[f64] {
        CorrelatingSpikeTrain::spikes_history(self)
    }
}

impl<G: SpikeGenerator + ?Sized> SpikeGenerator for Box<G> {
    fn advance(&mut self, t: f64, dt: f64) -> Result<bool, SpikeError> {
        (**self).advance(t, dt)
    }

    fn next_spike_time(&self) -> Option<f64> {
        (**self).next_spike_time()
    }

    fn spikes_history(&self) -> &[f64] {
        (**self).spikes_history()
    }
}

fn check_time_step(dt: f64) -> Result<(), SpikeError> {
    if dt <= 0.0 || !dt.is_finite() {
        return Err(SpikeError::InvalidParameter(
            "The time step must be positive and finite".to_string(),
        ));
    }
    Ok(())
}

/// Step every generator through the same fixed time grid, one step at a time.
///
/// The run aborts on the first [`SpikeError::CorruptedState`].
pub fn run<G: SpikeGenerator>(
    generators: &mut [G],
    start_time: f64,
    nsteps: usize,
    dt: f64,
) -> Result<(), SpikeError> {
    check_time_step(dt)?;
    let mut t = start_time;
    for _ in 0..nsteps {
        for generator in generators.iter_mut() {
            generator.advance(t, dt)?;
        }
        t += dt;
    }
    info!(
        "simulated {} generators over {} steps of {}",
        generators.len(),
        nsteps,
        dt
    );
    Ok(())
}

/// Step every generator through the same fixed time grid, in parallel.
///
/// The generators must be mutually independent (no train holding another's
/// history); each owns its seeded random source, so the histories are
/// identical to a sequential [`run`].
pub fn run_parallel<G: SpikeGenerator>(
    generators: &mut [G],
    start_time: f64,
    nsteps: usize,
    dt: f64,
) -> Result<(), SpikeError> {
    check_time_step(dt)?;
    generators.par_iter_mut().try_for_each(|generator| {
        let mut t = start_time;
        for _ in 0..nsteps {
            generator.advance(t, dt)?;
            t += dt;
        }
        Ok(())
    })?;
    info!(
        "simulated {} generators in parallel over {} steps of {}",
        generators.len(),
        nsteps,
        dt
    );
    Ok(())
}
