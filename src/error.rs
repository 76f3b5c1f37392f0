//! Error module for the Rusty Spikes library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq, Clone)]
pub enum SpikeError {
    /// Error for an ill-formed discrete distribution, e.g., an empty histogram or negative weights.
    InvalidDistribution(String),
    /// Error for invalid construction parameters.
    InvalidParameter(String),
    /// Error for a corrupted generator state. Fatal: the simulation run must be aborted,
    /// since it signals a misconfigured distribution rather than a recoverable condition.
    CorruptedState(String),
}

impl fmt::Display for SpikeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpikeError::InvalidDistribution(e) => write!(f, "Invalid distribution: {}", e),
            SpikeError::InvalidParameter(e) => write!(f, "Invalid parameters: {}", e),
            SpikeError::CorruptedState(e) => write!(f, "Corrupted generator state: {}", e),
        }
    }
}

impl Error for SpikeError {}
