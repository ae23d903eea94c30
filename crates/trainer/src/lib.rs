pub mod dataset;
pub mod error;
pub mod grid;
pub mod logging;
pub mod metrics;
pub mod optim;
pub mod session;
pub mod train;

#[cfg(test)]
mod testing;

pub use error::{Result, TrainError};
pub use grid::{run_grid, run_single, GridCandidates, GridCell, GridReport, RunConfig};
pub use optim::OptimizerKind;
pub use session::AutoencoderSession;
pub use train::{fit, Trainable, TrainHistory};

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use lstm_ae_core::SEQUENCE_LENGTH;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub epochs: usize,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub gradient_clip: f64,
    pub batch_size: usize,
    pub hidden_dim: i64,
    pub input_size: i64,
    /// Checkpoints are written to `{model_save_path}_{lr}_{hidden}_{clip}.model`.
    pub model_save_path: String,
    /// Each run gets its own metrics directory below this one.
    pub stats_dir: PathBuf,
    pub data_dir: PathBuf,
    pub shuffle: bool,
    pub grid_search: bool,
    pub grid: GridCandidates,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            optimizer: OptimizerKind::Adam,
            learning_rate: 1e-3,
            gradient_clip: 1.0,
            batch_size: 128,
            hidden_dim: 64,
            input_size: 1,
            model_save_path: "lstm_ae".to_string(),
            stats_dir: PathBuf::from("runs"),
            data_dir: PathBuf::from("."),
            shuffle: true,
            grid_search: false,
            grid: GridCandidates::default(),
        }
    }
}

impl TrainerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(reader)?)
    }

    /// Rejects configurations that would fail partway through a sweep.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(invalid("epochs must be positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch size must be positive"));
        }
        if self.input_size <= 0 || SEQUENCE_LENGTH % self.input_size != 0 {
            return Err(invalid(format!(
                "input size {} must be a positive divisor of {}",
                self.input_size, SEQUENCE_LENGTH
            )));
        }
        if self.model_save_path.is_empty() {
            return Err(invalid("model save path must not be empty"));
        }

        let (learning_rates, hidden_dims, clips) = if self.grid_search {
            if self.grid.is_empty() {
                return Err(invalid("grid search needs at least one candidate per hyperparameter"));
            }
            (
                self.grid.learning_rates.clone(),
                self.grid.hidden_dims.clone(),
                self.grid.gradient_clips.clone(),
            )
        } else {
            (vec![self.learning_rate], vec![self.hidden_dim], vec![self.gradient_clip])
        };

        if let Some(lr) = learning_rates.iter().find(|lr| !positive(**lr)) {
            return Err(invalid(format!("learning rate must be finite and positive, got {lr}")));
        }
        if let Some(hidden) = hidden_dims.iter().find(|h| **h <= 0) {
            return Err(invalid(format!("hidden dimension must be positive, got {hidden}")));
        }
        if let Some(clip) = clips.iter().find(|c| !positive(**c)) {
            return Err(invalid(format!("gradient clip must be finite and positive, got {clip}")));
        }

        Ok(())
    }

    /// The hyperparameter combinations this configuration trains.
    pub fn cells(&self) -> Vec<GridCell> {
        if self.grid_search {
            self.grid.cells()
        } else {
            vec![self.single_cell()]
        }
    }

    pub fn single_cell(&self) -> GridCell {
        GridCell {
            learning_rate: self.learning_rate,
            hidden_dim: self.hidden_dim,
            gradient_clip: self.gradient_clip,
        }
    }
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn invalid(msg: impl Into<String>) -> TrainError {
    TrainError::InvalidConfig(msg.into())
}
