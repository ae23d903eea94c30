use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;
use tch::Device;

use lstm_ae_core::ModelConfig;
use trainer::dataset::Splits;
use trainer::logging::{init_file_logger, DEFAULT_LOG_FILE};
use trainer::{run_grid, run_single, AutoencoderSession, OptimizerKind, RunConfig, TrainerConfig};

/// Train an LSTM autoencoder over the synthetic dataset.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Optimizer for the run
    #[arg(long, value_enum)]
    optimizer: Option<OptimizerKind>,

    /// Learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Gradient clipping threshold (max total norm)
    #[arg(long = "gd_clip")]
    gd_clip: Option<f64>,

    #[arg(long = "batch_size")]
    batch_size: Option<usize>,

    /// Hidden state size
    #[arg(long = "hidden_dim")]
    hidden_dim: Option<i64>,

    /// Output directory for per-run metrics
    #[arg(long = "stats_file")]
    stats_file: Option<PathBuf>,

    /// Checkpoint path prefix
    #[arg(long = "model_save_path")]
    model_save_path: Option<String>,

    #[arg(long = "input_size")]
    input_size: Option<i64>,

    /// Sweep the grid of learning rates, hidden sizes and clip thresholds
    #[arg(long = "grid_search")]
    grid_search: bool,

    /// YAML file with the base configuration and grid candidates
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding synthetic_dataset_{train,val,test}.json
    #[arg(long = "data_dir")]
    data_dir: Option<PathBuf>,

    #[arg(long = "log_file", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

impl Cli {
    /// The YAML file (or built-in defaults) with explicit flags on top.
    fn into_config(self) -> Result<TrainerConfig> {
        let mut config = match &self.config {
            Some(path) => TrainerConfig::load(path)
                .with_context(|| format!("Failed to load config {:?}", path))?,
            None => TrainerConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    /// Explicit flags win over the YAML file.
    fn apply(self, config: &mut TrainerConfig) {
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(optimizer) = self.optimizer {
            config.optimizer = optimizer;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(clip) = self.gd_clip {
            config.gradient_clip = clip;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(hidden_dim) = self.hidden_dim {
            config.hidden_dim = hidden_dim;
        }
        if let Some(stats_dir) = self.stats_file {
            config.stats_dir = stats_dir;
        }
        if let Some(prefix) = self.model_save_path {
            config.model_save_path = prefix;
        }
        if let Some(input_size) = self.input_size {
            config.input_size = input_size;
        }
        if let Some(data_dir) = self.data_dir {
            config.data_dir = data_dir;
        }
        config.grid_search |= self.grid_search;
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_file_logger(&cli.log_file)
        .with_context(|| format!("Failed to open log file {:?}", cli.log_file))?;

    let config = cli.into_config()?;
    config.validate()?;
    info!("configuration: {:?}", config);

    let device = Device::cuda_if_available();
    println!("Using device: {:?}", device);

    let splits = Splits::load(&config.data_dir, config.batch_size, config.input_size, config.shuffle)
        .with_context(|| format!("Failed to load dataset from {:?}", config.data_dir))?;

    let build = |run: &RunConfig| -> trainer::Result<AutoencoderSession> {
        let model_config = ModelConfig::new(run.input_size, run.hidden_dim)?;
        AutoencoderSession::new(&model_config, run.optimizer, run.learning_rate, device)
    };

    if config.grid_search {
        let report = run_grid(&config, &config.cells(), &splits, build)?;

        let report_path = config.stats_dir.join("grid_report.json");
        report
            .save(&report_path)
            .with_context(|| format!("Failed to write {:?}", report_path))?;

        if let Some(best) = report.best() {
            println!(
                "Best params: lr {} hidden {} clip {} test loss {:.6}",
                best.run.learning_rate,
                best.run.hidden_dim,
                best.run.gradient_clip,
                best.history.test_loss
            );
        }
    } else {
        let report = run_single(&config, &splits, build)?;
        println!(
            "Test loss {:.6} (best epoch {})",
            report.history.test_loss, report.history.best_epoch
        );
    }

    println!("Finished Training");
    Ok(())
}
