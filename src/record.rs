use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{ValidationError, MAX_MESSAGE_LEN};
use crate::level::Level;

/// Caller-supplied structured context attached to a record.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Build a [`Fields`] map from `key => value` pairs.
///
/// Values go through `serde_json::json!`, so anything serializable works.
#[macro_export]
macro_rules! fields {
    () => {
        $crate::Fields::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut fields = $crate::Fields::new();
        $(
            fields.insert(::std::string::String::from($key), $crate::__serde_json::json!($value));
        )+
        fields
    }};
}

/// Capture the current module path and line as a [`SourceLocation`].
#[macro_export]
macro_rules! location {
    () => {
        $crate::SourceLocation::new(::std::module_path!()).with_line(::std::line!())
    };
    ($function:expr) => {
        $crate::SourceLocation::new(::std::module_path!())
            .with_function($function)
            .with_line(::std::line!())
    };
}

/// Best-effort provenance of a call site, passed explicitly by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub module: Option<String>,
    pub function: Option<String>,
    pub line: Option<u32>,
}

impl SourceLocation {
    pub fn new(module: impl Into<String>) -> Self {
        SourceLocation {
            module: Some(module.into()),
            function: None,
            line: None,
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// A single structured log event.
///
/// Fields are private so a record cannot change once it has been handed to
/// the sinks; formatters and the store work from borrowed views or copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: Level,
    logger: String,
    message: String,
    location: SourceLocation,
    fields: Fields,
    exception: Option<String>,
}

impl LogRecord {
    /// Build a record stamped with the current time.
    ///
    /// The message is trimmed; an empty or over-long message is rejected.
    pub fn new(
        level: Level,
        logger: impl Into<String>,
        message: &str,
        fields: Fields,
        location: Option<SourceLocation>,
    ) -> Result<Self, ValidationError> {
        let message = validate_message(message)?;
        Ok(LogRecord {
            timestamp: Utc::now(),
            level,
            logger: logger.into(),
            message,
            location: location.unwrap_or_default(),
            fields,
            exception: None,
        })
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> &SourceLocation {
        &self.location
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn exception(&self) -> Option<&str> {
        self.exception.as_deref()
    }
}

/// Trim a message and check it against the length bounds.
pub fn validate_message(message: &str) -> Result<String, ValidationError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    let len = trimmed.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong {
            len,
            max: MAX_MESSAGE_LEN,
        });
    }
    Ok(trimmed.to_string())
}
