use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use log::{debug, info};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use tch::Tensor;

use lstm_ae_core::SEQUENCE_LENGTH;

use crate::error::{Result, TrainError};

const DATASET_STEM: &str = "synthetic_dataset";

/// Half-width of the window that gets damped in each synthetic sample.
const DIP_RADIUS: usize = 5;
const DIP_FACTOR: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    pub fn name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "val",
            Split::Test => "test",
        }
    }

    /// `{dir}/synthetic_dataset_{split}.json`
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_{}.json", DATASET_STEM, self.name()))
    }
}

/// A partition of flat samples, each holding [`SEQUENCE_LENGTH`] values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceDataset {
    pub sequences: Vec<Vec<f32>>,
}

impl SequenceDataset {
    pub fn new(sequences: Vec<Vec<f32>>) -> Self {
        Self { sequences }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let dataset: Self = serde_json::from_reader(reader)?;

        if dataset.is_empty() {
            return Err(malformed(path, "no sequences"));
        }
        if let Some((i, seq)) = dataset
            .sequences
            .iter()
            .enumerate()
            .find(|(_, seq)| seq.len() as i64 != SEQUENCE_LENGTH)
        {
            return Err(malformed(
                path,
                format!("sequence {} has {} values, expected {}", i, seq.len(), SEQUENCE_LENGTH),
            ));
        }

        debug!("Loaded {} sequences from {:?}", dataset.len(), path);
        Ok(dataset)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}

fn malformed(path: &Path, reason: impl Into<String>) -> TrainError {
    TrainError::MalformedDataset {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Serves a dataset as `[batch, seq_len, input_size]` tensors, reshuffling
/// sample order on every pass.
#[derive(Debug)]
pub struct DataLoader {
    dataset: SequenceDataset,
    batch_size: usize,
    input_size: i64,
    shuffle: bool,
}

impl DataLoader {
    pub fn new(dataset: SequenceDataset, batch_size: usize, input_size: i64, shuffle: bool) -> Self {
        Self {
            dataset,
            batch_size,
            input_size,
            shuffle,
        }
    }

    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Sample indices grouped into batches for one pass. The last batch
    /// holds the remainder and may be short.
    pub fn index_batches(&self) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut thread_rng());
        }
        order.chunks(self.batch_size).map(|c| c.to_vec()).collect()
    }

    /// One pass over the dataset as CPU tensors.
    pub fn batches(&self) -> impl Iterator<Item = Tensor> + '_ {
        let seq_len = SEQUENCE_LENGTH / self.input_size;

        self.index_batches().into_iter().map(move |indices| {
            let mut values = Vec::with_capacity(indices.len() * SEQUENCE_LENGTH as usize);
            for &i in &indices {
                values.extend_from_slice(&self.dataset.sequences[i]);
            }

            Tensor::from_slice(&values).view([indices.len() as i64, seq_len, self.input_size])
        })
    }
}

/// The train/validation/test loaders shared by every run of a sweep.
#[derive(Debug)]
pub struct Splits {
    pub train: DataLoader,
    pub validation: DataLoader,
    pub test: DataLoader,
}

impl Splits {
    pub fn load(dir: &Path, batch_size: usize, input_size: i64, shuffle: bool) -> Result<Self> {
        let [train, validation, test] = Split::ALL.map(|split| split.path_in(dir));
        let train = SequenceDataset::load(train)?;
        let validation = SequenceDataset::load(validation)?;
        let test = SequenceDataset::load(test)?;

        info!(
            "dataset sizes: train {}, val {}, test {}",
            train.len(),
            validation.len(),
            test.len()
        );

        let splits = Self {
            train: DataLoader::new(train, batch_size, input_size, shuffle),
            validation: DataLoader::new(validation, batch_size, input_size, shuffle),
            test: DataLoader::new(test, batch_size, input_size, shuffle),
        };
        debug!(
            "batches per pass: train {}, val {}, test {}",
            splits.train.num_batches(),
            splits.validation.num_batches(),
            splits.test.num_batches()
        );

        Ok(splits)
    }
}

/// Draws `count` sequences uniformly from [0, 1], each with an 11-value
/// window around a random index in [20, 30] scaled down by 10x.
pub fn generate_synthetic<R: Rng>(count: usize, rng: &mut R) -> Vec<Vec<f32>> {
    let len = SEQUENCE_LENGTH as usize;

    (0..count)
        .map(|_| {
            let mut seq: Vec<f32> = (0..len).map(|_| rng.gen_range(0.0..=1.0)).collect();
            let center = rng.gen_range(20..=30);
            for v in &mut seq[center - DIP_RADIUS..=center + DIP_RADIUS] {
                *v *= DIP_FACTOR;
            }
            seq
        })
        .collect()
}

/// Splits sequences 60/20/20 into train/validation/test, in order.
pub fn split_synthetic(mut sequences: Vec<Vec<f32>>) -> [SequenceDataset; 3] {
    let n = sequences.len();
    let n_train = n * 6 / 10;
    let n_val = n * 2 / 10;

    let test = sequences.split_off(n_train + n_val);
    let val = sequences.split_off(n_train);

    [
        SequenceDataset::new(sequences),
        SequenceDataset::new(val),
        SequenceDataset::new(test),
    ]
}
