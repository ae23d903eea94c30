use anyhow::{ensure, Context};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

use trainer::dataset::{generate_synthetic, split_synthetic, Split};

/// Generate the synthetic train/val/test sequence files.
#[derive(Parser)]
struct Cli {
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    #[arg(short, long, default_value_t = 10_000)]
    count: usize,
    /// Seed for reproducible datasets
    #[arg(short, long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ensure!(cli.count >= 5, "need at least 5 sequences to fill every split");

    if !cli.output_dir.exists() {
        std::fs::create_dir_all(&cli.output_dir)?;
    }

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let sequences = generate_synthetic(cli.count, &mut rng);
    let datasets = split_synthetic(sequences);

    for (split, dataset) in Split::ALL.into_iter().zip(datasets.iter()) {
        let path = split.path_in(&cli.output_dir);
        dataset
            .save(&path)
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Wrote {} sequences to {:?}", dataset.len(), path);
    }

    println!("Done. Generated {} sequences.", cli.count);
    Ok(())
}
