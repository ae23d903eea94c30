use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Torch error: {0}")]
    Tch(#[from] tch::TchError),

    #[error("Invalid model configuration: {0}")]
    Model(#[from] lstm_ae_core::ConfigError),

    #[error("Logger already initialised: {0}")]
    Logger(#[from] log::SetLoggerError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Malformed dataset {path:?}: {reason}")]
    MalformedDataset { path: PathBuf, reason: String },

    #[error("No checkpoint written to {0:?}: no epoch produced a comparable validation loss")]
    NoCheckpoint(PathBuf),
}

pub type Result<T> = std::result::Result<T, TrainError>;
