use std::io::{self, Write};
use std::sync::Mutex;

use crate::error::SinkError;
use crate::sink::SinkWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Writes each line to the process's stdout or stderr.
#[derive(Debug)]
pub struct ConsoleWriter {
    stream: ConsoleStream,
}

impl ConsoleWriter {
    pub fn new(stream: ConsoleStream) -> Self {
        ConsoleWriter { stream }
    }
}

impl SinkWriter for ConsoleWriter {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        match self.stream {
            ConsoleStream::Stdout => {
                let mut handle = io::stdout().lock();
                writeln!(handle, "{}", line)?;
            }
            ConsoleStream::Stderr => {
                let mut handle = io::stderr().lock();
                writeln!(handle, "{}", line)?;
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().lock().flush()?,
            ConsoleStream::Stderr => io::stderr().lock().flush()?,
        }
        Ok(())
    }
}

/// A writer that simply drops all lines.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// I/O, and for tests that only care about persistence.
#[derive(Debug, Clone, Default)]
pub struct NoopWriter;

impl SinkWriter for NoopWriter {
    fn write_line(&self, _line: &str) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps every written line in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    lines: Mutex<Vec<String>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}

impl SinkWriter for MemoryWriter {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        let mut lines = self.lines.lock().map_err(|_| SinkError::Poisoned)?;
        lines.push(line.to_string());
        Ok(())
    }
}
