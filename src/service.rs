//! Administrative operations over one logger and its store.
//!
//! This is what an HTTP or RPC front end calls: it owns no transport of its
//! own, only the request/response shapes and the semantics behind them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::env::{DEFAULT_BACKUP_COUNT, DEFAULT_MAX_FILE_SIZE};
use crate::error::{ConfigError, RepositoryError, StorageError};
use crate::level::Level;
use crate::logger::Logger;
use crate::record::{Fields, LogRecord, SourceLocation};
use crate::repository::{LogEntryPatch, LogFilter, LogRepository, NewLogEntry, StoredLogEntry};
use crate::sink::{SinkConfig, SinkTarget};

/// Id of the file sink managed through [`LoggerConfigUpdate::file_path`].
pub const FILE_SINK_ID: &str = "file";

pub const DEFAULT_QUERY_LIMIT: u32 = 100;

fn default_limit() -> u32 {
    DEFAULT_QUERY_LIMIT
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEntryRequest {
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub fields: Fields,
}

impl CreateEntryRequest {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        CreateEntryRequest {
            level,
            message: message.into(),
            module: None,
            function: None,
            line: None,
            fields: Fields::new(),
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(default)]
    pub level: Option<Level>,
    #[serde(default)]
    pub logger: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u64,
}

impl Default for LogQuery {
    fn default() -> Self {
        LogQuery {
            level: None,
            logger: None,
            start_time: None,
            end_time: None,
            limit: DEFAULT_QUERY_LIMIT,
            offset: 0,
        }
    }
}

impl LogQuery {
    fn filter(&self) -> LogFilter {
        LogFilter {
            level: self.level,
            logger: self.logger.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// One page of a query plus the number of matching rows overall.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogPage {
    pub entries: Vec<StoredLogEntry>,
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfigUpdate {
    #[serde(default)]
    pub min_level: Option<Level>,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggerConfigView {
    pub logger_name: String,
    pub min_level: Level,
    pub file_path: Option<PathBuf>,
    pub sink_count: usize,
    pub persist_to_store: bool,
}

pub struct LogService {
    logger: Arc<Logger>,
    repository: Arc<dyn LogRepository>,
}

impl LogService {
    pub fn new(logger: Arc<Logger>, repository: Arc<dyn LogRepository>) -> Self {
        LogService { logger, repository }
    }

    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// Emit the entry through the logger's sinks, then store it.
    ///
    /// The row is written directly, not through the logger's persistence
    /// queue, so it is never stored twice and the created row is returned.
    /// The logger's level gate decides only whether the sinks see it.
    pub async fn create_entry(&self, request: CreateEntryRequest) -> Result<StoredLogEntry, RepositoryError> {
        let location = SourceLocation {
            module: request.module,
            function: request.function,
            line: request.line,
        };
        let record = LogRecord::new(
            request.level,
            self.logger.name(),
            &request.message,
            request.fields,
            Some(location),
        )?;
        let entry = NewLogEntry::from_record(&record);
        // Reject what the store would reject before anything is written.
        entry.clone().into_row(record.timestamp())?;

        if self.logger.enabled(record.level()) {
            self.logger.dispatch(&record);
        }
        self.repository.create(entry).await
    }

    pub async fn query(&self, query: &LogQuery) -> Result<LogPage, RepositoryError> {
        let filter = query.filter();
        let entries = self.repository.list(&filter, query.offset, query.limit).await?;
        let total = self.repository.count(&filter).await?;
        Ok(LogPage {
            entries,
            total,
            limit: query.limit,
            offset: query.offset,
        })
    }

    pub async fn get_entry(&self, id: i64) -> Result<Option<StoredLogEntry>, StorageError> {
        self.repository.get_by_id(id).await
    }

    pub async fn update_entry(
        &self,
        id: i64,
        patch: LogEntryPatch,
    ) -> Result<Option<StoredLogEntry>, RepositoryError> {
        self.repository.update(id, patch).await
    }

    pub async fn delete_entry(&self, id: i64) -> Result<bool, StorageError> {
        self.repository.delete(id).await
    }

    /// Remove every stored entry and return how many there were.
    pub async fn delete_entries(&self) -> Result<u64, StorageError> {
        let removed = self.repository.delete_all().await?;
        tracing::info!(logger = %self.logger.name(), removed, "log entries deleted");
        Ok(removed)
    }

    pub fn logger_config(&self) -> LoggerConfigView {
        let config = self.logger.config();
        let file_path = config.sinks.iter().find_map(|sink| match &sink.target {
            SinkTarget::File { path, .. } if sink.id == FILE_SINK_ID => Some(path.clone()),
            _ => None,
        });
        LoggerConfigView {
            logger_name: self.logger.name().to_string(),
            min_level: self.logger.min_level(),
            file_path,
            sink_count: self.logger.sinks().len(),
            persist_to_store: self.logger.persist_to_store(),
        }
    }

    /// Change the level and/or the file sink's path.
    ///
    /// A level-only change is applied in place. A path change reopens the
    /// file sink through a full reconfiguration of the logger's current
    /// config, edited under its lock; if the new file cannot be opened
    /// nothing changes.
    pub fn update_logger_config(&self, update: LoggerConfigUpdate) -> Result<LoggerConfigView, ConfigError> {
        match update.file_path {
            None => {
                if let Some(level) = update.min_level {
                    self.logger.set_level(level);
                }
            }
            Some(path) => {
                self.logger.update_config(|config| {
                    if let Some(level) = update.min_level {
                        config.min_level = level;
                    }
                    let previous = config.sinks.iter().position(|s| s.id == FILE_SINK_ID);
                    let file_sink = match previous.map(|i| config.sinks.remove(i)) {
                        Some(SinkConfig {
                            threshold,
                            format,
                            target: SinkTarget::File {
                                max_bytes,
                                backup_count,
                                ..
                            },
                            ..
                        }) => SinkConfig::file(path, max_bytes, backup_count)
                            .with_threshold(threshold)
                            .with_format(format),
                        _ => SinkConfig::file(path, DEFAULT_MAX_FILE_SIZE, DEFAULT_BACKUP_COUNT),
                    };
                    config.sinks.push(file_sink);
                })?;
            }
        }
        Ok(self.logger_config())
    }
}
