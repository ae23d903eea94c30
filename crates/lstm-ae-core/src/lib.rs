pub mod config;
pub mod autoencoder;

pub use autoencoder::LstmAutoencoder;
pub use config::{ConfigError, ModelConfig, SEQUENCE_LENGTH};
