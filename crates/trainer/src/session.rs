use std::path::Path;

use log::debug;
use tch::nn::{self, Module};
use tch::{Device, Reduction, Tensor};

use lstm_ae_core::{LstmAutoencoder, ModelConfig};

use crate::dataset::DataLoader;
use crate::error::Result;
use crate::optim::OptimizerKind;
use crate::train::Trainable;

/// An [`LstmAutoencoder`] with its variables and optimizer, trained on
/// mean squared reconstruction error.
pub struct AutoencoderSession {
    vs: nn::VarStore,
    model: LstmAutoencoder,
    optimizer: nn::Optimizer,
    device: Device,
}

impl AutoencoderSession {
    pub fn new(
        model_config: &ModelConfig,
        optimizer: OptimizerKind,
        learning_rate: f64,
        device: Device,
    ) -> Result<Self> {
        let vs = nn::VarStore::new(device);
        let model = LstmAutoencoder::new(&vs.root(), model_config);
        let optimizer = optimizer.build(&vs, learning_rate)?;

        debug!(
            "built autoencoder {:?} with {} parameter tensors on {:?}",
            model_config,
            vs.variables().len(),
            device
        );

        Ok(Self {
            vs,
            model,
            optimizer,
            device,
        })
    }

    fn reconstruction_loss(&self, batch: &Tensor) -> Tensor {
        let x = batch.to_device(self.device);
        self.model.forward(&x).mse_loss(&x, Reduction::Mean)
    }
}

impl Trainable for AutoencoderSession {
    fn train_epoch(&mut self, data: &DataLoader, clip: f64) -> Result<f64> {
        let mut total = 0.0;
        let mut batches = 0usize;

        for batch in data.batches() {
            let loss = self.reconstruction_loss(&batch);
            self.optimizer.backward_step_clip_norm(&loss, clip);

            total += loss.double_value(&[]);
            batches += 1;
        }

        Ok(mean(total, batches))
    }

    fn evaluate(&self, data: &DataLoader) -> Result<f64> {
        let _guard = tch::no_grad_guard();

        let mut total = 0.0;
        let mut batches = 0usize;
        for batch in data.batches() {
            total += self.reconstruction_loss(&batch).double_value(&[]);
            batches += 1;
        }

        Ok(mean(total, batches))
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        self.vs.load(path)?;
        Ok(())
    }
}

/// An empty pass has no loss; NaN keeps it from ever counting as a best.
fn mean(total: f64, batches: usize) -> f64 {
    if batches == 0 {
        f64::NAN
    } else {
        total / batches as f64
    }
}
