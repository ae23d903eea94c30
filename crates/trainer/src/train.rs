use std::path::Path;

use log::{debug, info};
use serde::Serialize;

use crate::dataset::{DataLoader, Splits};
use crate::error::{Result, TrainError};
use crate::grid::RunConfig;
use crate::metrics::ScalarSink;

pub const TRAIN_LOSS_TAG: &str = "Train Loss";
pub const VALIDATION_LOSS_TAG: &str = "Validation Loss";
pub const TEST_LOSS_TAG: &str = "Test Loss";

/// A model together with its optimizer and loss criterion.
pub trait Trainable {
    /// One pass over `data` updating parameters, gradients clipped to a
    /// total norm of `clip`. Returns the mean batch loss.
    fn train_epoch(&mut self, data: &DataLoader, clip: f64) -> Result<f64>;

    /// Mean batch loss over `data` without touching parameters.
    fn evaluate(&self, data: &DataLoader) -> Result<f64>;

    fn save(&mut self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainHistory {
    pub train_loss: Vec<f64>,
    pub validation_loss: Vec<f64>,
    /// Loss on the test split, using the parameters from `best_epoch`.
    pub test_loss: f64,
    pub best_epoch: usize,
    pub best_validation_loss: f64,
}

/// Trains for `run.epochs`, checkpointing to `run.checkpoint_path` whenever
/// validation loss strictly improves, then restores the best checkpoint and
/// scores it on the test split.
pub fn fit<M, S>(model: &mut M, run: &RunConfig, sink: &mut S, splits: &Splits) -> Result<TrainHistory>
where
    M: Trainable + ?Sized,
    S: ScalarSink + ?Sized,
{
    let save_path = run.checkpoint_path.as_path();
    let mut train_loss = Vec::with_capacity(run.epochs);
    let mut validation_loss = Vec::with_capacity(run.epochs);
    let mut best: Option<(usize, f64)> = None;

    info!("start training");
    for epoch in 0..run.epochs {
        let train = model.train_epoch(&splits.train, run.gradient_clip)?;
        let validation = model.evaluate(&splits.validation)?;
        train_loss.push(train);
        validation_loss.push(validation);

        if improves(best.map(|(_, loss)| loss), validation) {
            model.save(save_path)?;
            best = Some((epoch, validation));
            debug!("saved checkpoint {:?} at epoch {}", save_path, epoch);
        }

        match best {
            Some((_, loss)) => info!("best loss {}, finished epoch {}", loss, epoch),
            None => info!("best loss none, finished epoch {}", epoch),
        }
        sink.add_scalar(TRAIN_LOSS_TAG, train, Some(epoch))?;
        sink.add_scalar(VALIDATION_LOSS_TAG, validation, Some(epoch))?;
    }

    let (best_epoch, best_validation_loss) =
        best.ok_or_else(|| TrainError::NoCheckpoint(save_path.to_path_buf()))?;

    model.load(save_path)?;
    let test_loss = model.evaluate(&splits.test)?;
    sink.add_scalar(TEST_LOSS_TAG, test_loss, None)?;
    info!("test loss {} using epoch {}", test_loss, best_epoch);

    Ok(TrainHistory {
        train_loss,
        validation_loss,
        test_loss,
        best_epoch,
        best_validation_loss,
    })
}

/// NaN never improves on anything, including an empty tracker.
pub(crate) fn improves(best: Option<f64>, candidate: f64) -> bool {
    match best {
        Some(best) => candidate < best,
        None => !candidate.is_nan(),
    }
}
