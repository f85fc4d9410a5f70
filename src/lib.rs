//! Structured logging pipeline: leveled records, pluggable sinks with
//! JSON or text layouts, and an optional queryable store of log entries.

pub mod error;
pub mod level;
pub mod record;
pub mod format;
pub mod sink;
pub mod writers;
pub mod file;
pub mod manager;
pub mod fallback;
pub mod logger;
pub mod registry;
pub mod persist;
pub mod repository;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod store;
pub mod service;
pub mod env;
pub mod layer;
pub mod init;

#[doc(hidden)]
pub use serde_json as __serde_json;

pub use error::{ConfigError, RepositoryError, SinkError, StorageError, ValidationError};
pub use fallback::{FallbackReporter, LoggingFailure, StderrReporter, TracingReporter};
pub use format::Format;
pub use level::Level;
pub use logger::{Logger, LoggerConfig, LoggerOptions, LoggerSnapshot};
pub use manager::{DispatchReport, SinkManager};
pub use memory::MemoryLogRepository;
pub use record::{Fields, LogRecord, SourceLocation};
pub use registry::LoggerRegistry;
pub use repository::{LogEntryPatch, LogFilter, LogRepository, NewLogEntry, StoredLogEntry};
pub use service::{CreateEntryRequest, LogQuery, LogService, LoggerConfigUpdate};
pub use sink::{Sink, SinkConfig, SinkTarget, SinkWriter};
pub use writers::{MemoryWriter, NoopWriter};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLogRepository;
