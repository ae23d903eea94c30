//! Scripted stand-ins for the model and metrics sink.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::dataset::{DataLoader, SequenceDataset, Splits};
use crate::error::Result;
use crate::grid::RunConfig;
use crate::metrics::ScalarSink;
use crate::optim::OptimizerKind;
use crate::train::Trainable;

/// Replays a fixed validation-loss curve. Its "parameters" are the number
/// of epochs trained so far, which is what a checkpoint file stores.
#[derive(Debug, Default)]
pub(crate) struct ScriptedModel {
    validation: Vec<f64>,
    trained: usize,
    fail_at: Option<usize>,
    test_loss: Option<f64>,
    checkpoint: Option<PathBuf>,
    pub saved_epochs: Vec<usize>,
    pub checkpoint_after_epoch: Vec<usize>,
    pub loaded_epoch: Option<usize>,
}

impl ScriptedModel {
    pub fn new(validation: Vec<f64>) -> Self {
        Self {
            validation,
            ..Default::default()
        }
    }

    pub fn failing_at(mut self, epoch: usize) -> Self {
        self.fail_at = Some(epoch);
        self
    }

    /// Reports `loss` for the test split regardless of the restored epoch.
    pub fn with_test_loss(mut self, loss: f64) -> Self {
        self.test_loss = Some(loss);
        self
    }

    pub fn test_loss_for(epoch: usize) -> f64 {
        100.0 + epoch as f64
    }

    fn read_checkpoint(path: &Path) -> Result<usize> {
        let text = fs::read_to_string(path)?;
        text.trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad checkpoint").into())
    }

    fn record_checkpoint(&mut self) -> Result<()> {
        if let Some(path) = self.checkpoint.clone() {
            let epoch = Self::read_checkpoint(&path)?;
            self.checkpoint_after_epoch.push(epoch);
        }
        Ok(())
    }
}

impl Trainable for ScriptedModel {
    fn train_epoch(&mut self, _data: &DataLoader, _clip: f64) -> Result<f64> {
        if self.trained > 0 {
            self.record_checkpoint()?;
        }
        if self.fail_at == Some(self.trained) {
            return Err(io::Error::new(io::ErrorKind::Other, "scripted failure").into());
        }
        self.trained += 1;
        Ok(1.0 / self.trained as f64)
    }

    fn evaluate(&self, _data: &DataLoader) -> Result<f64> {
        match self.loaded_epoch {
            Some(epoch) => Ok(self.test_loss.unwrap_or_else(|| Self::test_loss_for(epoch))),
            None => Ok(self.validation[self.trained - 1]),
        }
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        let epoch = self.trained - 1;
        fs::write(path, epoch.to_string())?;
        self.saved_epochs.push(epoch);
        self.checkpoint = Some(path.to_path_buf());
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.record_checkpoint()?;
        self.loaded_epoch = Some(Self::read_checkpoint(path)?);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    pub events: Vec<(String, f64, Option<usize>)>,
}

impl ScalarSink for MemorySink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: Option<usize>) -> Result<()> {
        self.events.push((tag.to_string(), value, step));
        Ok(())
    }
}

pub(crate) fn empty_splits() -> Splits {
    let loader = || DataLoader::new(SequenceDataset::default(), 4, 1, false);
    Splits {
        train: loader(),
        validation: loader(),
        test: loader(),
    }
}

pub(crate) fn run_config(dir: &Path, epochs: usize) -> RunConfig {
    RunConfig {
        epochs,
        optimizer: OptimizerKind::Adam,
        learning_rate: 1e-3,
        gradient_clip: 1.0,
        batch_size: 4,
        hidden_dim: 8,
        input_size: 1,
        checkpoint_path: dir.join("model_0.001_8_1.model"),
        metrics_dir: dir.join("stats"),
    }
}
