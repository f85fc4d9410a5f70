//! Persistent store of log entries.
//!
//! [`LogRepository`] is the only way to touch stored rows. Every mutation
//! either applies completely or leaves the store as it was.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{
    RepositoryError, StorageError, ValidationError, MAX_PAGE_LIMIT, MAX_SOURCE_LEN,
};
use crate::level::Level;
use crate::record::{validate_message, Fields, LogRecord};

/// Field key under which a record's exception text is persisted.
pub const EXCEPTION_FIELD: &str = "exception";

/// A log entry as stored, with its store-assigned identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: Level,
    pub logger: String,
    pub message: String,
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to persist a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLogEntry {
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub logger: String,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub function: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub fields: Fields,
    /// Event time; the store uses its own clock when absent.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewLogEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        NewLogEntry {
            level,
            message: message.into(),
            logger: String::new(),
            module: None,
            function: None,
            line: None,
            fields: Fields::new(),
            timestamp: None,
        }
    }

    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.logger = logger.into();
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Project an emitted record into a create request.
    pub fn from_record(record: &LogRecord) -> Self {
        let location = record.location();
        let mut fields = record.fields().clone();
        if let Some(exception) = record.exception() {
            fields.insert(EXCEPTION_FIELD.to_string(), exception.into());
        }
        NewLogEntry {
            level: record.level(),
            message: record.message().to_string(),
            logger: record.logger().to_string(),
            module: location.module.clone(),
            function: location.function.clone(),
            line: location.line,
            fields,
            timestamp: Some(record.timestamp()),
        }
    }

    /// Validate and normalize into the row that will be written.
    ///
    /// `id` is left at zero for the store to assign.
    pub(crate) fn into_row(self, now: DateTime<Utc>) -> Result<StoredLogEntry, ValidationError> {
        let message = validate_message(&self.message)?;
        check_source("module", self.module.as_deref())?;
        check_source("function", self.function.as_deref())?;
        if self.line == Some(0) {
            return Err(ValidationError::InvalidLine);
        }
        let now = now.trunc_subsecs(6);
        Ok(StoredLogEntry {
            id: 0,
            timestamp: self.timestamp.map(|t| t.trunc_subsecs(6)).unwrap_or(now),
            level: self.level,
            logger: self.logger,
            message,
            module: self.module,
            function: self.function,
            line: self.line,
            fields: self.fields,
            created_at: now,
            updated_at: None,
        })
    }
}

fn check_source(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if v.chars().count() > MAX_SOURCE_LEN => Err(ValidationError::SourceTooLong {
            field,
            max: MAX_SOURCE_LEN,
        }),
        _ => Ok(()),
    }
}

/// Partial update; only `Some` fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntryPatch {
    pub level: Option<Level>,
    pub message: Option<String>,
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
    pub fields: Option<Fields>,
}

impl LogEntryPatch {
    /// Apply to a copy of `entry`, stamping `updated_at`.
    pub(crate) fn apply(
        self,
        entry: &StoredLogEntry,
        now: DateTime<Utc>,
    ) -> Result<StoredLogEntry, ValidationError> {
        let mut next = entry.clone();
        if let Some(level) = self.level {
            next.level = level;
        }
        if let Some(message) = self.message {
            next.message = validate_message(&message)?;
        }
        if let Some(module) = self.module {
            check_source("module", Some(&module))?;
            next.module = Some(module);
        }
        if let Some(function) = self.function {
            check_source("function", Some(&function))?;
            next.function = Some(function);
        }
        if let Some(line) = self.line {
            if line == 0 {
                return Err(ValidationError::InvalidLine);
            }
            next.line = Some(line);
        }
        if let Some(fields) = self.fields {
            next.fields = fields;
        }
        next.updated_at = Some(now.trunc_subsecs(6));
        Ok(next)
    }
}

/// Query filter. All bounds are inclusive; `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogFilter {
    pub level: Option<Level>,
    pub logger: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl LogFilter {
    pub fn level(level: Level) -> Self {
        LogFilter {
            level: Some(level),
            ..Default::default()
        }
    }

    pub fn matches(&self, entry: &StoredLogEntry) -> bool {
        self.level.map_or(true, |l| entry.level == l)
            && self.logger.as_deref().map_or(true, |l| entry.logger == l)
            && self.start_time.map_or(true, |t| entry.timestamp >= t)
            && self.end_time.map_or(true, |t| entry.timestamp <= t)
    }
}

/// Reject pagination parameters outside `skip >= 0`, `1 <= limit <= 1000`.
pub fn validate_page(skip: u64, limit: u32) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_PAGE_LIMIT {
        return Err(ValidationError::LimitOutOfRange {
            got: limit,
            max: MAX_PAGE_LIMIT,
        });
    }
    if skip > i64::MAX as u64 {
        return Err(ValidationError::OffsetOutOfRange(skip));
    }
    Ok(())
}

/// CRUD and filtered, paginated queries over stored log entries.
///
/// `list` orders by timestamp descending (most recent first), ties broken by
/// descending id.
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Assign an id and creation time and store the entry.
    async fn create(&self, entry: NewLogEntry) -> Result<StoredLogEntry, RepositoryError>;

    async fn get_by_id(&self, id: i64) -> Result<Option<StoredLogEntry>, StorageError>;

    async fn list(
        &self,
        filter: &LogFilter,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<StoredLogEntry>, RepositoryError>;

    async fn count(&self, filter: &LogFilter) -> Result<u64, StorageError>;

    /// Returns `Ok(None)` when `id` does not exist.
    async fn update(
        &self,
        id: i64,
        patch: LogEntryPatch,
    ) -> Result<Option<StoredLogEntry>, RepositoryError>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: i64) -> Result<bool, StorageError>;

    /// Remove every row, returning how many were removed.
    async fn delete_all(&self) -> Result<u64, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields;
    use chrono::TimeZone;

    #[test]
    fn page_bounds() {
        assert!(validate_page(0, 1).is_ok());
        assert!(validate_page(10, 1000).is_ok());
        assert!(matches!(
            validate_page(0, 0),
            Err(ValidationError::LimitOutOfRange { got: 0, .. })
        ));
        assert!(matches!(
            validate_page(0, 1001),
            Err(ValidationError::LimitOutOfRange { got: 1001, .. })
        ));
        assert!(validate_page(u64::MAX, 10).is_err());
    }

    #[test]
    fn draft_is_trimmed_and_validated() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let row = NewLogEntry::new(Level::Info, "  hi  ").into_row(now).unwrap();
        assert_eq!(row.message, "hi");
        assert_eq!(row.timestamp, now);
        assert_eq!(row.created_at, now);

        let err = NewLogEntry::new(Level::Info, " ").into_row(now).unwrap_err();
        assert_eq!(err, ValidationError::EmptyMessage);

        let mut draft = NewLogEntry::new(Level::Info, "x");
        draft.module = Some("m".repeat(MAX_SOURCE_LEN + 1));
        assert!(matches!(
            draft.into_row(now),
            Err(ValidationError::SourceTooLong { field: "module", .. })
        ));

        let mut draft = NewLogEntry::new(Level::Info, "x");
        draft.line = Some(0);
        assert_eq!(draft.into_row(now).unwrap_err(), ValidationError::InvalidLine);
    }

    #[test]
    fn from_record_carries_exception_in_fields() {
        let record = LogRecord::new(Level::Error, "svc", "failed", fields! { "a" => 1 }, None)
            .unwrap()
            .with_exception("Io: gone");
        let draft = NewLogEntry::from_record(&record);
        assert_eq!(draft.logger, "svc");
        assert_eq!(draft.fields["a"], 1);
        assert_eq!(draft.fields[EXCEPTION_FIELD], "Io: gone");
        assert_eq!(draft.timestamp, Some(record.timestamp()));
    }

    #[test]
    fn patch_applies_only_present_fields() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let row = NewLogEntry::new(Level::Info, "original")
            .with_fields(fields! { "k" => "v" })
            .into_row(now)
            .unwrap();
        let later = now + chrono::Duration::seconds(5);
        let patched = LogEntryPatch {
            level: Some(Level::Error),
            ..Default::default()
        }
        .apply(&row, later)
        .unwrap();

        assert_eq!(patched.level, Level::Error);
        assert_eq!(patched.message, "original");
        assert_eq!(patched.fields, row.fields);
        assert_eq!(patched.updated_at, Some(later));
    }

    #[test]
    fn filter_bounds_are_inclusive() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let row = NewLogEntry::new(Level::Warning, "x")
            .with_timestamp(t)
            .into_row(t)
            .unwrap();
        let filter = LogFilter {
            start_time: Some(t),
            end_time: Some(t),
            ..Default::default()
        };
        assert!(filter.matches(&row));
        assert!(!LogFilter::level(Level::Error).matches(&row));
    }
}
