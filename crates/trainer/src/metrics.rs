use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const SCALARS_FILE: &str = "scalars.jsonl";

/// Receives scalar time series for visualization.
pub trait ScalarSink {
    /// `step` is `None` for one-off values such as the final test loss.
    fn add_scalar(&mut self, tag: &str, value: f64, step: Option<usize>) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEvent {
    pub tag: String,
    pub value: f64,
    pub step: Option<usize>,
    /// Seconds since the Unix epoch.
    pub wall_time: f64,
}

/// Appends scalar events as JSON lines to `{dir}/scalars.jsonl`.
pub struct ScalarWriter {
    writer: BufWriter<File>,
}

impl ScalarWriter {
    pub fn create<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(SCALARS_FILE))?;

        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn close(mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl ScalarSink for ScalarWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: Option<usize>) -> Result<()> {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        let event = ScalarEvent {
            tag: tag.to_string(),
            value,
            step,
            wall_time,
        };
        serde_json::to_writer(&mut self.writer, &event)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Reads back every event written to a run directory.
pub fn read_scalars<P: AsRef<Path>>(dir: P) -> Result<Vec<ScalarEvent>> {
    let reader = BufReader::new(File::open(dir.as_ref().join(SCALARS_FILE))?);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}
