//! Environment variable names and a settings loader for configuring a
//! logger from the process environment.
//!
//! These are helpers; the core types never read the environment themselves.

use std::path::PathBuf;

use crate::format::Format;
use crate::level::Level;
use crate::logger::LoggerConfig;
use crate::sink::SinkConfig;

/// Minimum level, e.g. `DEBUG`, `warning`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Path of the rotating log file. Unset or empty means no file sink.
pub const LOG_FILE_PATH_ENV: &str = "LOG_FILE_PATH";

/// Size in bytes at which the log file rotates.
pub const LOG_MAX_FILE_SIZE_ENV: &str = "LOG_MAX_FILE_SIZE";

/// Number of rotated files to keep.
pub const LOG_BACKUP_COUNT_ENV: &str = "LOG_BACKUP_COUNT";

/// `true` for JSON lines, `false` for the text layout.
pub const LOG_FORMAT_JSON_ENV: &str = "LOG_FORMAT_JSON";

/// Whether emitted records are also written to the store.
pub const LOG_DATABASE_ENABLED_ENV: &str = "LOG_DATABASE_ENABLED";

/// Store URL, see [`parse_store_url`](crate::store::parse_store_url).
pub const LOG_DATABASE_URL_ENV: &str = "LOG_DATABASE_URL";

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: usize = 5;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./logs.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: Level,
    pub file_path: Option<PathBuf>,
    pub max_file_size: u64,
    pub backup_count: usize,
    pub format_json: bool,
    pub database_enabled: bool,
    pub database_url: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: Level::Info,
            file_path: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            backup_count: DEFAULT_BACKUP_COUNT,
            format_json: true,
            database_enabled: false,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl LoggingSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. Values that fail to
    /// parse keep their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LoggingSettings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let level = match get(LOG_LEVEL_ENV).map(|v| v.parse::<Level>()) {
            Some(Ok(level)) => level,
            Some(Err(error)) => {
                tracing::warn!(%error, "ignoring {}", LOG_LEVEL_ENV);
                defaults.level
            }
            None => defaults.level,
        };

        LoggingSettings {
            level,
            file_path: get(LOG_FILE_PATH_ENV).map(PathBuf::from),
            max_file_size: get(LOG_MAX_FILE_SIZE_ENV)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_file_size),
            backup_count: get(LOG_BACKUP_COUNT_ENV)
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.backup_count),
            format_json: get(LOG_FORMAT_JSON_ENV)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.format_json),
            database_enabled: get(LOG_DATABASE_ENABLED_ENV)
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.database_enabled),
            database_url: get(LOG_DATABASE_URL_ENV).unwrap_or(defaults.database_url),
        }
    }

    pub fn format(&self) -> Format {
        if self.format_json {
            Format::Json
        } else {
            Format::Text
        }
    }

    /// Console sink, plus a rotating file sink when a path is set.
    pub fn logger_config(&self) -> LoggerConfig {
        let format = self.format();
        let mut config = LoggerConfig::new(self.level)
            .with_sink(SinkConfig::stdout().with_format(format))
            .with_persistence(self.database_enabled);
        if let Some(path) = &self.file_path {
            config = config.with_sink(
                SinkConfig::file(path.clone(), self.max_file_size, self.backup_count).with_format(format),
            );
        }
        config
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SinkTarget;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let settings = LoggingSettings::from_lookup(|_| None);
        assert_eq!(settings, LoggingSettings::default());
        assert_eq!(settings.max_file_size, 10_485_760);

        let config = settings.logger_config();
        assert_eq!(config.min_level, Level::Info);
        assert_eq!(config.sinks.len(), 1);
        assert_eq!(config.sinks[0].id, "console");
        assert!(!config.persist_to_store);
    }

    #[test]
    fn reads_every_variable() {
        let settings = LoggingSettings::from_lookup(lookup(&[
            (LOG_LEVEL_ENV, "debug"),
            (LOG_FILE_PATH_ENV, "/var/log/app.log"),
            (LOG_MAX_FILE_SIZE_ENV, "2048"),
            (LOG_BACKUP_COUNT_ENV, "2"),
            (LOG_FORMAT_JSON_ENV, "false"),
            (LOG_DATABASE_ENABLED_ENV, "1"),
            (LOG_DATABASE_URL_ENV, "memory://"),
        ]));
        assert_eq!(settings.level, Level::Debug);
        assert_eq!(settings.file_path, Some(PathBuf::from("/var/log/app.log")));
        assert_eq!(settings.max_file_size, 2048);
        assert_eq!(settings.backup_count, 2);
        assert_eq!(settings.format(), Format::Text);
        assert!(settings.database_enabled);
        assert_eq!(settings.database_url, "memory://");

        let config = settings.logger_config();
        assert!(config.persist_to_store);
        assert_eq!(config.sinks.len(), 2);
        let file = &config.sinks[1];
        assert_eq!(file.format, Format::Text);
        match &file.target {
            SinkTarget::File {
                max_bytes,
                backup_count,
                ..
            } => {
                assert_eq!(*max_bytes, 2048);
                assert_eq!(*backup_count, 2);
            }
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn bad_values_fall_back() {
        let settings = LoggingSettings::from_lookup(lookup(&[
            (LOG_LEVEL_ENV, "verbose"),
            (LOG_MAX_FILE_SIZE_ENV, "big"),
            (LOG_FORMAT_JSON_ENV, "maybe"),
            (LOG_FILE_PATH_ENV, "  "),
        ]));
        assert_eq!(settings, LoggingSettings::default());
    }
}
