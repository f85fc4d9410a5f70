use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::SinkError;
use crate::file::RotatingFileWriter;
use crate::format::Format;
use crate::level::Level;
use crate::record::LogRecord;
use crate::writers::{ConsoleStream, ConsoleWriter};

/// Destination that accepts already-rendered log lines.
///
/// Implementations are called synchronously from the emitting thread, so
/// `write_line` should be bounded: no retries, no waiting on the network.
pub trait SinkWriter: Send + Sync {
    /// Write one rendered record, without a trailing newline.
    ///
    /// **Returns**
    /// - `Ok(())` if the destination accepted the line.
    /// - `Err(..)` if the destination is unavailable. The sink manager
    ///   reports the error out-of-band and keeps dispatching to the other
    ///   sinks.
    fn write_line(&self, line: &str) -> Result<(), SinkError>;

    /// Flush buffered output. Default implementation is a no-op.
    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A named destination with its own level threshold and formatter.
pub struct Sink {
    id: String,
    threshold: Level,
    format: Format,
    writer: Arc<dyn SinkWriter>,
}

impl Sink {
    pub fn new(
        id: impl Into<String>,
        threshold: Level,
        format: Format,
        writer: Arc<dyn SinkWriter>,
    ) -> Self {
        Sink {
            id: id.into(),
            threshold,
            format,
            writer,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn threshold(&self) -> Level {
        self.threshold
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn accepts(&self, level: Level) -> bool {
        level >= self.threshold
    }

    /// Render the record with this sink's format and write it.
    pub fn emit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let line = self.format.render(record);
        self.writer.write_line(&line)
    }

    pub fn flush(&self) -> Result<(), SinkError> {
        self.writer.flush()
    }
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("id", &self.id)
            .field("threshold", &self.threshold)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Where a configured sink writes to.
#[derive(Clone)]
pub enum SinkTarget {
    Stdout,
    Stderr,
    /// Size-rotated file; `max_bytes = 0` disables rotation.
    File {
        path: PathBuf,
        max_bytes: u64,
        backup_count: usize,
    },
    /// Caller-provided writer, shared as-is across rebuilds.
    Custom(Arc<dyn SinkWriter>),
}

impl fmt::Debug for SinkTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkTarget::Stdout => f.write_str("Stdout"),
            SinkTarget::Stderr => f.write_str("Stderr"),
            SinkTarget::File {
                path,
                max_bytes,
                backup_count,
            } => f
                .debug_struct("File")
                .field("path", path)
                .field("max_bytes", max_bytes)
                .field("backup_count", backup_count)
                .finish(),
            SinkTarget::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Declarative description of a sink, rebuilt on every reconfiguration.
#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub id: String,
    /// Per-sink threshold; records below it are skipped by this sink only.
    pub threshold: Level,
    pub format: Format,
    pub target: SinkTarget,
}

impl SinkConfig {
    pub fn new(id: impl Into<String>, target: SinkTarget) -> Self {
        SinkConfig {
            id: id.into(),
            threshold: Level::Debug,
            format: Format::Json,
            target,
        }
    }

    pub fn stdout() -> Self {
        SinkConfig::new("console", SinkTarget::Stdout)
    }

    pub fn file(path: impl Into<PathBuf>, max_bytes: u64, backup_count: usize) -> Self {
        SinkConfig::new(
            "file",
            SinkTarget::File {
                path: path.into(),
                max_bytes,
                backup_count,
            },
        )
    }

    pub fn custom(id: impl Into<String>, writer: Arc<dyn SinkWriter>) -> Self {
        SinkConfig::new(id, SinkTarget::Custom(writer))
    }

    pub fn with_threshold(mut self, threshold: Level) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Open the destination and produce a ready sink.
    pub fn build(&self) -> Result<Sink, SinkError> {
        let writer: Arc<dyn SinkWriter> = match &self.target {
            SinkTarget::Stdout => Arc::new(ConsoleWriter::new(ConsoleStream::Stdout)),
            SinkTarget::Stderr => Arc::new(ConsoleWriter::new(ConsoleStream::Stderr)),
            SinkTarget::File {
                path,
                max_bytes,
                backup_count,
            } => Arc::new(RotatingFileWriter::open(path, *max_bytes, *backup_count)?),
            SinkTarget::Custom(writer) => Arc::clone(writer),
        };
        Ok(Sink::new(self.id.clone(), self.threshold, self.format, writer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use crate::writers::MemoryWriter;

    #[test]
    fn sink_threshold_is_inclusive() {
        let sink = Sink::new("mem", Level::Warning, Format::Text, Arc::new(MemoryWriter::new()));
        assert!(!sink.accepts(Level::Info));
        assert!(sink.accepts(Level::Warning));
        assert!(sink.accepts(Level::Critical));
    }

    #[test]
    fn emit_renders_with_sink_format() {
        let writer = Arc::new(MemoryWriter::new());
        let sink = SinkConfig::custom("mem", writer.clone())
            .with_format(Format::Json)
            .build()
            .unwrap();
        let record = LogRecord::new(Level::Info, "svc", "hi", fields! { "k" => 1 }, None).unwrap();
        sink.emit(&record).unwrap();

        let lines = writer.lines();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(value["k"], 1);
    }

    #[test]
    fn file_target_fails_to_build_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join("app.log");
        // A file where a directory is expected cannot be created.
        std::fs::write(dir.path().join("missing"), b"not a dir").unwrap();
        let err = SinkConfig::file(path, 0, 0).build().unwrap_err();
        assert!(matches!(err, SinkError::Io(_)));
    }
}
