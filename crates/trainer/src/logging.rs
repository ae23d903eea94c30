use std::fmt::Display;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};
use log::Record;

use crate::error::Result;

pub const DEFAULT_LOG_FILE: &str = "lstm_ae_train.log";

/// Routes `log` records to `path`, truncating it first. `RUST_LOG`
/// overrides the debug default.
pub fn init_file_logger(path: &Path) -> Result<()> {
    let file = open_log_file(path)?;

    Builder::from_env(Env::default().default_filter_or("debug"))
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| {
            let timestamp = buf.timestamp_seconds();
            write_record(buf, timestamp, record)
        })
        .try_init()?;

    Ok(())
}

/// Each run starts from an empty log.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    File::create(path)
}

/// `{timestamp} {LEVEL:<8} {message}`
pub fn write_record<W: Write>(out: &mut W, timestamp: impl Display, record: &Record) -> io::Result<()> {
    writeln!(out, "{} {:<8} {}", timestamp, record.level(), record.args())
}
