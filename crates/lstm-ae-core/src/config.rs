use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of scalar values in every synthetic sample.
pub const SEQUENCE_LENGTH: i64 = 50;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("input size must be positive, got {0}")]
    InvalidInputSize(i64),

    #[error("hidden dimension must be positive, got {0}")]
    InvalidHiddenDim(i64),

    #[error("input size {input_size} does not divide the sequence length {}", SEQUENCE_LENGTH)]
    IndivisibleSequence { input_size: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Width of each vector fed to the encoder per time step.
    pub input_size: i64,
    /// Size of the LSTM hidden state, shared by encoder and decoder.
    pub hidden_dim: i64,
    /// Number of time steps in a sample.
    pub seq_len: i64,
}

impl ModelConfig {
    /// Builds a config for samples of [`SEQUENCE_LENGTH`] values split into
    /// `input_size`-wide steps.
    pub fn new(input_size: i64, hidden_dim: i64) -> Result<Self, ConfigError> {
        if input_size <= 0 {
            return Err(ConfigError::InvalidInputSize(input_size));
        }
        if hidden_dim <= 0 {
            return Err(ConfigError::InvalidHiddenDim(hidden_dim));
        }
        if SEQUENCE_LENGTH % input_size != 0 {
            return Err(ConfigError::IndivisibleSequence { input_size });
        }

        Ok(Self {
            input_size,
            hidden_dim,
            seq_len: SEQUENCE_LENGTH / input_size,
        })
    }
}
