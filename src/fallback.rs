use std::fmt;

use crate::error::{RepositoryError, SinkError, ValidationError};

/// A failure inside the logging pipeline that must not reach the caller.
#[derive(Debug)]
pub enum LoggingFailure<'a> {
    /// A sink's destination rejected a write.
    SinkWrite {
        logger: &'a str,
        sink: &'a str,
        error: &'a SinkError,
    },
    /// Flushing a sink failed.
    SinkFlush {
        logger: &'a str,
        sink: &'a str,
        error: &'a SinkError,
    },
    /// Emission-time persistence of a record failed.
    Persist {
        logger: &'a str,
        error: &'a RepositoryError,
    },
    /// The persistence queue was full or closed and the record was dropped.
    PersistDropped { logger: &'a str },
    /// A record produced inside the pipeline (e.g. by the `tracing` bridge)
    /// was rejected and could not be emitted.
    Invalid {
        logger: &'a str,
        error: &'a ValidationError,
    },
}

impl fmt::Display for LoggingFailure<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingFailure::SinkWrite { logger, sink, error } => {
                write!(f, "logger {}: write to sink {} failed: {}", logger, sink, error)
            }
            LoggingFailure::SinkFlush { logger, sink, error } => {
                write!(f, "logger {}: flush of sink {} failed: {}", logger, sink, error)
            }
            LoggingFailure::Persist { logger, error } => {
                write!(f, "logger {}: persisting record failed: {}", logger, error)
            }
            LoggingFailure::PersistDropped { logger } => {
                write!(f, "logger {}: persistence queue full, dropping record", logger)
            }
            LoggingFailure::Invalid { logger, error } => {
                write!(f, "logger {}: record rejected: {}", logger, error)
            }
        }
    }
}

/// Last-resort channel for failures of the logging infrastructure itself.
pub trait FallbackReporter: Send + Sync {
    fn report(&self, failure: &LoggingFailure<'_>);
}

/// Prints failures to stderr. The default reporter.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrReporter;

impl FallbackReporter for StderrReporter {
    fn report(&self, failure: &LoggingFailure<'_>) {
        eprintln!("log-recorder: {}", failure);
    }
}

/// Emits failures as `tracing` events under `log_recorder::fallback`.
///
/// Do not combine with a tracing bridge that feeds the same logger unless
/// the bridge ignores this target, or failures will loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FallbackReporter for TracingReporter {
    fn report(&self, failure: &LoggingFailure<'_>) {
        tracing::error!(target: "log_recorder::fallback", "{}", failure);
    }
}
