use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::packet::DecodedEvent;
use crate::outputs::Outputer;
use crate::utils::error::OutputError;

/// File sink writing one JSON object per line
pub struct FileOutputer {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl FileOutputer {
    /// Open `path` for appending
    pub fn create(path: &Path) -> Result<Self, OutputError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Outputer for FileOutputer {
    fn publish(&mut self, event: &DecodedEvent) -> Result<(), OutputError> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path().display())
    }
}
