use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};

use crate::dataset::Splits;
use crate::error::Result;
use crate::metrics::ScalarWriter;
use crate::optim::OptimizerKind;
use crate::train::{fit, improves, Trainable, TrainHistory};
use crate::TrainerConfig;

/// Candidate values swept when grid search is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridCandidates {
    pub learning_rates: Vec<f64>,
    pub hidden_dims: Vec<i64>,
    pub gradient_clips: Vec<f64>,
}

impl Default for GridCandidates {
    fn default() -> Self {
        Self {
            learning_rates: vec![0.0001],
            hidden_dims: vec![128, 256],
            gradient_clips: vec![1.0, 0.5, 0.1],
        }
    }
}

impl GridCandidates {
    /// Learning rate outermost, then hidden width, then clip threshold.
    pub fn cells(&self) -> Vec<GridCell> {
        let mut cells = Vec::with_capacity(self.len());
        for &learning_rate in &self.learning_rates {
            for &hidden_dim in &self.hidden_dims {
                for &gradient_clip in &self.gradient_clips {
                    cells.push(GridCell {
                        learning_rate,
                        hidden_dim,
                        gradient_clip,
                    });
                }
            }
        }
        cells
    }

    pub fn len(&self) -> usize {
        self.learning_rates.len() * self.hidden_dims.len() * self.gradient_clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub learning_rate: f64,
    pub hidden_dim: i64,
    pub gradient_clip: f64,
}

impl GridCell {
    /// `{prefix}_{lr}_{hidden}_{clip}.model`
    pub fn checkpoint_path(&self, prefix: &str) -> PathBuf {
        PathBuf::from(format!(
            "{}_{}_{}_{}.model",
            prefix, self.learning_rate, self.hidden_dim, self.gradient_clip
        ))
    }

    /// Name of the cell's metrics directory.
    pub fn comment(&self, epochs: usize) -> String {
        format!(
            "gradient_clip = {} lr = {} hidden_dim = {} epochs = {}",
            self.gradient_clip, self.learning_rate, self.hidden_dim, epochs
        )
    }
}

/// Everything one trainer-loop invocation needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub epochs: usize,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub gradient_clip: f64,
    pub batch_size: usize,
    pub hidden_dim: i64,
    pub input_size: i64,
    pub checkpoint_path: PathBuf,
    pub metrics_dir: PathBuf,
}

impl RunConfig {
    pub fn for_cell(config: &TrainerConfig, cell: GridCell) -> Self {
        Self {
            epochs: config.epochs,
            optimizer: config.optimizer,
            learning_rate: cell.learning_rate,
            gradient_clip: cell.gradient_clip,
            batch_size: config.batch_size,
            hidden_dim: cell.hidden_dim,
            input_size: config.input_size,
            checkpoint_path: cell.checkpoint_path(&config.model_save_path),
            metrics_dir: config.stats_dir.join(cell.comment(config.epochs)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CellReport {
    pub run: RunConfig,
    pub history: TrainHistory,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GridReport {
    pub cells: Vec<CellReport>,
    /// Index into `cells` of the lowest test loss.
    pub best: Option<usize>,
}

impl GridReport {
    pub fn best(&self) -> Option<&CellReport> {
        self.best.and_then(|i| self.cells.get(i))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// Trains a fresh model per cell, each with its own checkpoint and metrics
/// directory. The first failing cell aborts the sweep.
pub fn run_grid<M, F>(
    config: &TrainerConfig,
    cells: &[GridCell],
    splits: &Splits,
    mut build: F,
) -> Result<GridReport>
where
    M: Trainable,
    F: FnMut(&RunConfig) -> Result<M>,
{
    let mut report = GridReport::default();
    let mut best_test_loss: Option<f64> = None;

    for &cell in cells {
        let cell_report = run_cell(config, cell, splits, &mut build)?;
        let test_loss = cell_report.history.test_loss;

        if improves(best_test_loss, test_loss) {
            best_test_loss = Some(test_loss);
            report.best = Some(report.cells.len());
            info!(
                "best params , lr {} , hidden {}, clip {}, loss {}",
                cell.learning_rate, cell.hidden_dim, cell.gradient_clip, test_loss
            );
        }

        report.cells.push(cell_report);
    }

    Ok(report)
}

/// A non-grid run: one cell built from the scalar hyperparameters.
pub fn run_single<M, F>(config: &TrainerConfig, splits: &Splits, mut build: F) -> Result<CellReport>
where
    M: Trainable,
    F: FnMut(&RunConfig) -> Result<M>,
{
    run_cell(config, config.single_cell(), splits, &mut build)
}

fn run_cell<M, F>(
    config: &TrainerConfig,
    cell: GridCell,
    splits: &Splits,
    build: &mut F,
) -> Result<CellReport>
where
    M: Trainable,
    F: FnMut(&RunConfig) -> Result<M>,
{
    let run = RunConfig::for_cell(config, cell);
    if let Some(parent) = run.checkpoint_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    info!(
        "training {} with optimizer {}, checkpoint {:?}",
        cell.comment(run.epochs),
        run.optimizer,
        run.checkpoint_path
    );

    let mut sink = ScalarWriter::create(&run.metrics_dir)?;
    let mut model = build(&run)?;
    let history = fit(&mut model, &run, &mut sink, splits)?;
    sink.close()?;

    Ok(CellReport { run, history })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{read_scalars, SCALARS_FILE};
    use crate::testing::{empty_splits, ScriptedModel};
    use crate::train::TEST_LOSS_TAG;

    fn config(root: &Path, epochs: usize) -> TrainerConfig {
        TrainerConfig {
            epochs,
            optimizer: OptimizerKind::Sgd,
            model_save_path: root.join("ae").to_string_lossy().into_owned(),
            stats_dir: root.join("stats"),
            grid_search: true,
            ..Default::default()
        }
    }

    #[test]
    fn cells_iterate_lr_then_hidden_then_clip() {
        let grid = GridCandidates {
            learning_rates: vec![0.1, 0.01],
            hidden_dims: vec![8, 16],
            gradient_clips: vec![1.0, 0.5],
        };

        let cells = grid.cells();
        assert_eq!(cells.len(), 8);
        assert_eq!(grid.len(), 8);
        assert_eq!(
            cells[..3]
                .iter()
                .map(|c| (c.learning_rate, c.hidden_dim, c.gradient_clip))
                .collect::<Vec<_>>(),
            vec![(0.1, 8, 1.0), (0.1, 8, 0.5), (0.1, 16, 1.0)]
        );
        assert_eq!(cells[7].learning_rate, 0.01);
    }

    #[test]
    fn checkpoint_and_comment_use_shortest_decimals() {
        let cell = GridCell {
            learning_rate: 0.0001,
            hidden_dim: 128,
            gradient_clip: 1.0,
        };
        assert_eq!(cell.checkpoint_path("out/ae"), PathBuf::from("out/ae_0.0001_128_1.model"));
        assert_eq!(cell.comment(3), "gradient_clip = 1 lr = 0.0001 hidden_dim = 128 epochs = 3");
    }

    #[test]
    fn default_grid_writes_six_checkpoints_and_six_metric_dirs() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 3);
        let cells = config.cells();
        assert_eq!(cells.len(), 6);

        let report = run_grid(&config, &cells, &empty_splits(), |_| {
            Ok(ScriptedModel::new(vec![0.5, 0.3, 0.4]))
        })
        .unwrap();

        assert_eq!(report.cells.len(), 6);
        let checkpoints = fs::read_dir(root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "model"))
            .count();
        assert_eq!(checkpoints, 6);

        let metric_dirs: Vec<PathBuf> = fs::read_dir(&config.stats_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(metric_dirs.len(), 6);
        for dir in &metric_dirs {
            assert!(dir.join(SCALARS_FILE).exists());
        }

        for cell in &report.cells {
            assert!(cell.run.checkpoint_path.exists());
            assert_eq!(fs::read_to_string(&cell.run.checkpoint_path).unwrap(), "1");
            let events = read_scalars(&cell.run.metrics_dir).unwrap();
            assert_eq!(events.len(), 7);
            assert_eq!(events[6].tag, TEST_LOSS_TAG);
        }
    }

    #[test]
    fn every_cell_uses_the_selected_optimizer() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 1);
        let mut seen = Vec::new();

        run_grid(&config, &config.cells(), &empty_splits(), |run| {
            seen.push(run.optimizer);
            Ok(ScriptedModel::new(vec![0.5]))
        })
        .unwrap();

        assert_eq!(seen, vec![OptimizerKind::Sgd; 6]);
    }

    #[test]
    fn best_cell_has_lowest_test_loss() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 3);
        // the scripted test loss grows with the best epoch, so the cell
        // whose curve bottoms out first wins
        let curves = [
            vec![0.5, 0.4, 0.3],
            vec![0.5, 0.6, 0.7],
            vec![0.5, 0.4, 0.6],
        ];
        let mut curve = curves.iter().cycle();

        let report = run_grid(&config, &config.cells(), &empty_splits(), |_| {
            Ok(ScriptedModel::new(curve.next().unwrap().clone()))
        })
        .unwrap();

        assert_eq!(report.best, Some(1));
        let best = report.best().unwrap();
        assert_eq!(best.history.best_epoch, 0);
        assert_eq!(best.run.hidden_dim, 128);
        assert_eq!(best.run.gradient_clip, 0.5);
    }

    #[test]
    fn failing_cell_aborts_the_sweep() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 2);
        let mut built = 0;

        let result = run_grid(&config, &config.cells(), &empty_splits(), |_| {
            built += 1;
            let model = ScriptedModel::new(vec![0.5, 0.4]);
            Ok(if built == 2 { model.failing_at(0) } else { model })
        });

        assert!(result.is_err());
        assert_eq!(built, 2);
    }

    #[test]
    fn single_run_uses_scalar_hyperparameters() {
        let root = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            grid_search: false,
            learning_rate: 0.01,
            hidden_dim: 32,
            gradient_clip: 0.5,
            ..config(root.path(), 2)
        };

        let report = run_single(&config, &empty_splits(), |_| {
            Ok(ScriptedModel::new(vec![0.2, 0.1]))
        })
        .unwrap();

        assert_eq!(
            report.run.checkpoint_path,
            root.path().join("ae_0.01_32_0.5.model")
        );
        assert_eq!(report.history.best_epoch, 1);
        assert_eq!(fs::read_dir(&config.stats_dir).unwrap().count(), 1);
    }

    #[test]
    fn report_serializes_to_json() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 1);
        let report = run_grid(&config, &config.cells()[..1], &empty_splits(), |_| {
            Ok(ScriptedModel::new(vec![0.5]))
        })
        .unwrap();

        let path = root.path().join("grid_report.json");
        report.save(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(value["best"], 0);
        assert_eq!(value["cells"][0]["run"]["optimizer"], "SGD");
    }

    #[test]
    fn diverged_first_cell_never_becomes_best() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 2);
        let mut built = 0;

        let report = run_grid(&config, &config.cells(), &empty_splits(), |_| {
            built += 1;
            let model = ScriptedModel::new(vec![0.5, 0.4]);
            Ok(if built == 1 { model.with_test_loss(f64::NAN) } else { model })
        })
        .unwrap();

        assert!(report.cells[0].history.test_loss.is_nan());
        assert_eq!(report.best, Some(1));
        assert_eq!(report.best().unwrap().history.test_loss, ScriptedModel::test_loss_for(1));
    }

    #[test]
    fn all_nan_grid_has_no_best() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path(), 1);

        let report = run_grid(&config, &config.cells()[..2], &empty_splits(), |_| {
            Ok(ScriptedModel::new(vec![0.5]).with_test_loss(f64::NAN))
        })
        .unwrap();

        assert_eq!(report.best, None);
        assert!(report.best().is_none());
    }

    #[test]
    fn checkpoint_directory_is_created() {
        let root = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            grid_search: false,
            model_save_path: root
                .path()
                .join("models")
                .join("lstm_ae")
                .to_string_lossy()
                .into_owned(),
            ..config(root.path(), 2)
        };

        let report = run_single(&config, &empty_splits(), |_| {
            Ok(ScriptedModel::new(vec![0.3, 0.2]))
        })
        .unwrap();

        assert!(report.run.checkpoint_path.starts_with(root.path().join("models")));
        assert_eq!(fs::read_to_string(&report.run.checkpoint_path).unwrap(), "1");
    }

    #[test]
    fn best_lookup_tolerates_out_of_range_index() {
        let report = GridReport {
            cells: Vec::new(),
            best: Some(3),
        };
        assert!(report.best().is_none());
    }
}
