use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::SinkError;
use crate::sink::SinkWriter;

struct FileState {
    // `None` after `close()`, or after a failed reopen until the next write.
    file: Option<BufWriter<File>>,
    size: u64,
    closed: bool,
}

/// Appends lines to a file, rotating it by size.
///
/// When a write would push the file past `max_bytes`, the current file is
/// renamed to `<path>.1`, existing backups shift up by one and anything
/// beyond `backup_count` is removed. With `backup_count = 0` the file is
/// truncated in place instead.
pub struct RotatingFileWriter {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    state: Mutex<FileState>,
}

impl RotatingFileWriter {
    pub fn open(
        path: impl AsRef<Path>,
        max_bytes: u64,
        backup_count: usize,
    ) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        tracing::debug!(path = %path.display(), size, "opened log file");

        Ok(RotatingFileWriter {
            path,
            max_bytes,
            backup_count,
            state: Mutex::new(FileState {
                file: Some(BufWriter::new(file)),
                size,
                closed: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the underlying handle; later writes fail with
    /// [`SinkError::Closed`].
    pub fn close(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        state.closed = true;
        if let Some(mut file) = state.file.take() {
            file.flush()?;
        }
        Ok(())
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn shift_backups(&self) -> Result<(), SinkError> {
        let oldest = self.backup_path(self.backup_count);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        // The live file may have been removed behind our back.
        if self.path.exists() {
            fs::rename(&self.path, self.backup_path(1))?;
        }
        Ok(())
    }

    /// Rotate, then reopen `path` whether or not the rotation succeeded so
    /// the sink keeps writing. The first rotation error is returned.
    fn rotate(&self, state: &mut FileState) -> Result<(), SinkError> {
        let flushed = match state.file.take() {
            Some(mut file) => file.flush().map_err(SinkError::from),
            None => Ok(()),
        };
        let shifted = if self.backup_count > 0 {
            self.shift_backups()
        } else {
            Ok(())
        };

        let file = if self.backup_count > 0 {
            open_append(&self.path)?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&self.path)?
        };
        state.size = file.metadata()?.len();
        state.file = Some(BufWriter::new(file));
        tracing::debug!(path = %self.path.display(), "rotated log file");
        flushed.and(shifted)
    }

    fn reopen(&self, state: &mut FileState) -> Result<(), SinkError> {
        let file = open_append(&self.path)?;
        state.size = file.metadata()?.len();
        state.file = Some(BufWriter::new(file));
        tracing::debug!(path = %self.path.display(), "reopened log file");
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<File, SinkError> {
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl SinkWriter for RotatingFileWriter {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        if state.closed {
            return Err(SinkError::Closed(self.path.display().to_string()));
        }
        if state.file.is_none() {
            self.reopen(&mut state)?;
        }

        let len = line.len() as u64 + 1;
        let rotated = if self.max_bytes > 0 && state.size > 0 && state.size + len > self.max_bytes {
            self.rotate(&mut state)
        } else {
            Ok(())
        };

        let Some(file) = state.file.as_mut() else {
            rotated?;
            return Err(SinkError::Closed(self.path.display().to_string()));
        };
        writeln!(file, "{}", line)?;
        file.flush()?;
        state.size += len;
        // A failed rotation still delivers the line, then surfaces.
        rotated
    }

    fn flush(&self) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Poisoned)?;
        if let Some(file) = state.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}
