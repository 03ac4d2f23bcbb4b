//! Size based rotation for the log file sink.
//!
//! The active file is `<path>/<name>`. Rotated files are `<name>.1` (newest)
//! through `<name>.<keep>` (oldest); anything older is deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::models::config::LogRotationPolicy;

/// Writer that rotates its file once a size threshold would be crossed
pub struct FileRotator {
    policy: LogRotationPolicy,
    file: Option<File>,
    current_size: u64,
}

impl FileRotator {
    /// Open (or append to) the active log file, creating the directory if needed
    pub fn open(policy: LogRotationPolicy) -> io::Result<Self> {
        fs::create_dir_all(&policy.path)?;
        let file = open_append(&policy.active_file())?;
        let current_size = file.metadata()?.len();

        Ok(Self { policy, file: Some(file), current_size })
    }

    /// Bytes written to the active file
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    /// Path of the n-th rotated file (1 = newest)
    pub fn rotated_file(&self, n: usize) -> PathBuf {
        self.policy.path.join(format!("{}.{}", self.policy.name, n))
    }

    /// Move the active file to `.1`, shift older files up and drop the excess
    pub fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        let active = self.policy.active_file();
        let keep = self.policy.keep_files;

        if keep == 0 {
            remove_if_exists(&active)?;
        } else {
            remove_if_exists(&self.rotated_file(keep))?;
            for n in (1..keep).rev() {
                let from = self.rotated_file(n);
                if from.exists() {
                    fs::rename(&from, self.rotated_file(n + 1))?;
                }
            }
            if active.exists() {
                fs::rename(&active, self.rotated_file(1))?;
            }
        }

        self.file = Some(open_append(&active)?);
        self.current_size = 0;
        Ok(())
    }

    fn should_rotate(&self, incoming: usize) -> bool {
        let size = self.current_size();
        size > 0 && size.saturating_add(incoming as u64) > self.policy.rotate_every_bytes
    }
}

impl Write for FileRotator {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.should_rotate(buf.len()) {
            self.rotate()?;
        }

        if self.file.is_none() {
            self.file = Some(open_append(&self.policy.active_file())?);
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log file unavailable"))?;

        let written = file.write(buf)?;
        self.current_size += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
