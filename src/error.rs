//! Error types for the logging pipeline.
//!
//! Failures reachable from the emission path never surface to the caller
//! as these types; they are wrapped into [`LoggingFailure`] and handed to a
//! [`FallbackReporter`]. Administrative calls (repository CRUD,
//! reconfiguration) return them directly.
//!
//! [`LoggingFailure`]: crate::fallback::LoggingFailure
//! [`FallbackReporter`]: crate::fallback::FallbackReporter

use std::io;

/// Maximum length of a log message, in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Maximum length of the `module` / `function` provenance columns.
pub const MAX_SOURCE_LEN: usize = 100;

/// Inclusive bounds of the `limit` accepted by list queries.
pub const MAX_PAGE_LIMIT: u32 = 1000;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("message is {len} characters long, the maximum is {max}")]
    MessageTooLong { len: usize, max: usize },

    #[error("unknown log level: {0:?}")]
    UnknownLevel(String),

    #[error("limit must be between 1 and {max}, got {got}")]
    LimitOutOfRange { got: u32, max: u32 },

    #[error("offset {0} is out of range")]
    OffsetOutOfRange(u64),

    #[error("{field} is longer than {max} characters")]
    SourceTooLong { field: &'static str, max: usize },

    #[error("line number must be at least 1")]
    InvalidLine,
}

/// Failure of a sink's destination.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("sink {0} is closed")]
    Closed(String),

    #[error("sink lock poisoned")]
    Poisoned,

    #[error("{0}")]
    Other(String),
}

/// Failure of the storage layer behind a [`LogRepository`].
///
/// [`LogRepository`]: crate::repository::LogRepository
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to encode fields: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("stored row is corrupt: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Error returned by direct repository calls.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Error returned when building or reconfiguring a logger.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to build sink {id}: {source}")]
    SinkBuild {
        id: String,
        #[source]
        source: SinkError,
    },

    #[error("duplicate sink id {0}")]
    DuplicateSink(String),

    #[error("persistence requested for logger {0} but no repository is attached")]
    MissingRepository(String),

    #[error("store persistence needs a running tokio runtime")]
    NoRuntime,

    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
}
