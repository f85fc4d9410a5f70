use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use serde::Serialize;

use crate::error::{ConfigError, ValidationError};
use crate::fallback::{FallbackReporter, LoggingFailure, StderrReporter};
use crate::fields;
use crate::level::Level;
use crate::manager::{DispatchReport, SinkManager};
use crate::persist::{PersistCounts, PersistQueue, DEFAULT_QUEUE_CAPACITY};
use crate::record::{Fields, LogRecord, SourceLocation};
use crate::repository::{LogRepository, NewLogEntry};
use crate::sink::{Sink, SinkConfig};

/// Declarative configuration of one logger.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Records below this level are discarded before any work is done.
    pub min_level: Level,
    /// Sinks in dispatch order; ids must be unique.
    pub sinks: Vec<SinkConfig>,
    /// Also write every emitted record to the attached repository.
    pub persist_to_store: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            min_level: Level::Info,
            sinks: vec![SinkConfig::stdout()],
            persist_to_store: false,
        }
    }
}

impl LoggerConfig {
    /// A config with no sinks at all.
    pub fn new(min_level: Level) -> Self {
        LoggerConfig {
            min_level,
            sinks: Vec::new(),
            persist_to_store: false,
        }
    }

    pub fn with_sink(mut self, sink: SinkConfig) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persist_to_store = enabled;
        self
    }

    /// Open every sink, failing on the first error or duplicate id.
    pub fn build_sinks(&self) -> Result<Vec<Sink>, ConfigError> {
        let mut seen = HashSet::new();
        let mut sinks = Vec::with_capacity(self.sinks.len());
        for cfg in &self.sinks {
            if !seen.insert(cfg.id.as_str()) {
                return Err(ConfigError::DuplicateSink(cfg.id.clone()));
            }
            let sink = cfg.build().map_err(|source| ConfigError::SinkBuild {
                id: cfg.id.clone(),
                source,
            })?;
            sinks.push(sink);
        }
        Ok(sinks)
    }
}

/// Collaborators shared by the loggers of one pipeline.
#[derive(Clone)]
pub struct LoggerOptions {
    pub repository: Option<Arc<dyn LogRepository>>,
    pub reporter: Arc<dyn FallbackReporter>,
    pub queue_capacity: usize,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        LoggerOptions {
            repository: None,
            reporter: Arc::new(StderrReporter),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LoggerOptions {
    pub fn with_repository(mut self, repository: Arc<dyn LogRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FallbackReporter>) -> Self {
        self.reporter = reporter;
        self
    }
}

/// Point-in-time view of a logger's effective configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggerSnapshot {
    pub name: String,
    pub min_level: Level,
    pub sink_ids: Vec<String>,
    pub sink_count: usize,
    pub persist_to_store: bool,
}

/// The emission API.
///
/// A call below the configured level returns immediately: no record is
/// built and neither sinks nor the store are touched. Otherwise the record
/// is dispatched to the sinks on the calling thread and, if enabled, queued
/// for persistence. Sink and store failures go to the fallback reporter;
/// only an invalid message is returned to the caller.
pub struct Logger {
    name: String,
    min_level: AtomicU8,
    persist: AtomicBool,
    sinks: SinkManager,
    // Serializes reconfiguration and holds the last applied config.
    config: Mutex<LoggerConfig>,
    options: LoggerOptions,
    queue: OnceLock<PersistQueue>,
}

impl Logger {
    /// Build a logger with no repository and the stderr fallback reporter.
    pub fn new(name: impl Into<String>, config: LoggerConfig) -> Result<Self, ConfigError> {
        Self::with_options(name, config, LoggerOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        config: LoggerConfig,
        options: LoggerOptions,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let sinks = config.build_sinks()?;
        let logger = Logger {
            name,
            min_level: AtomicU8::new(config.min_level.as_u8()),
            persist: AtomicBool::new(config.persist_to_store),
            sinks: SinkManager::from_sinks(sinks),
            config: Mutex::new(config.clone()),
            options,
            queue: OnceLock::new(),
        };
        if config.persist_to_store {
            logger.ensure_queue()?;
        }
        tracing::debug!(
            logger = %logger.name,
            min_level = %config.min_level,
            sinks = logger.sinks.len(),
            persist = config.persist_to_store,
            "logger created"
        );
        Ok(logger)
    }

    fn ensure_queue(&self) -> Result<(), ConfigError> {
        if self.queue.get().is_some() {
            return Ok(());
        }
        let repository = self
            .options
            .repository
            .clone()
            .ok_or_else(|| ConfigError::MissingRepository(self.name.clone()))?;
        let queue = PersistQueue::spawn(
            &self.name,
            repository,
            Arc::clone(&self.options.reporter),
            self.options.queue_capacity,
        )?;
        // Callers hold the config lock, so nobody else can have set it.
        let _ = self.queue.set(queue);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn min_level(&self) -> Level {
        Level::from_u8(self.min_level.load(Ordering::Acquire))
    }

    /// Whether a record at `level` would pass the gate.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level()
    }

    pub fn persist_to_store(&self) -> bool {
        self.persist.load(Ordering::Acquire)
    }

    /// The sinks attached to this logger.
    pub fn sinks(&self) -> &SinkManager {
        &self.sinks
    }

    /// Last configuration applied through construction or
    /// [`reconfigure`](Self::reconfigure).
    pub fn config(&self) -> LoggerConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> LoggerSnapshot {
        let sink_ids = self.sinks.ids();
        LoggerSnapshot {
            name: self.name.clone(),
            min_level: self.min_level(),
            sink_count: sink_ids.len(),
            sink_ids,
            persist_to_store: self.persist_to_store(),
        }
    }

    /// Hand a pipeline failure to this logger's fallback reporter.
    pub fn report(&self, failure: &LoggingFailure<'_>) {
        self.options.reporter.report(failure);
    }

    pub fn persist_stats(&self) -> Option<PersistCounts> {
        self.queue.get().map(PersistQueue::stats)
    }

    /// Change only the level gate.
    pub fn set_level(&self, level: Level) {
        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.min_level = level;
        self.min_level.store(level.as_u8(), Ordering::Release);
    }

    /// Replace the whole configuration.
    ///
    /// Every sink of `config` is opened before anything is swapped; if one
    /// fails, the previous configuration stays in effect and the error is
    /// returned.
    ///
    /// The level gate, the persistence flag and the sink list are three
    /// separate publications. The gate goes first, so an emitter racing
    /// with this call may see the new level dispatched to the old sinks,
    /// never the new sinks behind the old level.
    pub fn reconfigure(&self, config: LoggerConfig) -> Result<(), ConfigError> {
        let mut current = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        self.apply(&mut current, config)
    }

    /// Edit the current configuration in place and apply the result.
    ///
    /// `edit` runs under the configuration lock, so a concurrent
    /// [`set_level`](Self::set_level) or reconfiguration is never lost
    /// between reading and applying.
    pub fn update_config<F>(&self, edit: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut LoggerConfig),
    {
        let mut current = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = current.clone();
        edit(&mut next);
        self.apply(&mut current, next)
    }

    fn apply(&self, current: &mut LoggerConfig, config: LoggerConfig) -> Result<(), ConfigError> {
        let sinks = config.build_sinks()?;
        if config.persist_to_store {
            self.ensure_queue()?;
        }

        self.min_level
            .store(config.min_level.as_u8(), Ordering::Release);
        self.persist.store(config.persist_to_store, Ordering::Release);
        self.sinks.replace_all(sinks);
        tracing::debug!(
            logger = %self.name,
            min_level = %config.min_level,
            sinks = config.sinks.len(),
            persist = config.persist_to_store,
            "logger reconfigured"
        );
        *current = config;
        Ok(())
    }

    /// Gate, then build the record lazily and emit it.
    ///
    /// `build` is only called when `level` passes the gate, so expensive
    /// message formatting or field collection costs nothing when filtered.
    pub fn log_with<M, F>(
        &self,
        level: Level,
        location: Option<SourceLocation>,
        build: F,
    ) -> Result<(), ValidationError>
    where
        M: AsRef<str>,
        F: FnOnce() -> (M, Fields),
    {
        if !self.enabled(level) {
            return Ok(());
        }
        let (message, fields) = build();
        let record = LogRecord::new(level, self.name.as_str(), message.as_ref(), fields, location)?;
        self.emit(&record);
        Ok(())
    }

    pub fn log(&self, level: Level, message: &str, fields: Fields) -> Result<(), ValidationError> {
        self.log_with(level, None, || (message, fields))
    }

    pub fn log_at(
        &self,
        level: Level,
        message: &str,
        fields: Fields,
        location: SourceLocation,
    ) -> Result<(), ValidationError> {
        self.log_with(level, Some(location), || (message, fields))
    }

    pub fn debug(&self, message: &str, fields: Fields) -> Result<(), ValidationError> {
        self.log(Level::Debug, message, fields)
    }

    pub fn info(&self, message: &str, fields: Fields) -> Result<(), ValidationError> {
        self.log(Level::Info, message, fields)
    }

    pub fn warning(&self, message: &str, fields: Fields) -> Result<(), ValidationError> {
        self.log(Level::Warning, message, fields)
    }

    pub fn error(&self, message: &str, fields: Fields) -> Result<(), ValidationError> {
        self.log(Level::Error, message, fields)
    }

    pub fn critical(&self, message: &str, fields: Fields) -> Result<(), ValidationError> {
        self.log(Level::Critical, message, fields)
    }

    /// Log at ERROR with the error's type and source chain attached.
    ///
    /// For a trait object (`&*boxed_error`) the static type says nothing, so
    /// the type is taken from the leading name of its `Debug` output.
    pub fn exception<E>(&self, message: &str, error: &E, fields: Fields) -> Result<(), ValidationError>
    where
        E: StdError + ?Sized,
    {
        self.exception_with(message, error, fields, None)
    }

    pub fn exception_at<E>(
        &self,
        message: &str,
        error: &E,
        fields: Fields,
        location: SourceLocation,
    ) -> Result<(), ValidationError>
    where
        E: StdError + ?Sized,
    {
        self.exception_with(message, error, fields, Some(location))
    }

    fn exception_with<E>(
        &self,
        message: &str,
        error: &E,
        fields: Fields,
        location: Option<SourceLocation>,
    ) -> Result<(), ValidationError>
    where
        E: StdError + ?Sized,
    {
        if !self.enabled(Level::Error) {
            return Ok(());
        }
        let type_name = error_type_name(error);
        let mut fields = fields;
        fields.insert("exception_type".to_string(), type_name.as_str().into());
        let record = LogRecord::new(Level::Error, self.name.as_str(), message, fields, location)?
            .with_exception(describe_error(&type_name, error));
        self.emit(&record);
        Ok(())
    }

    /// Log a served HTTP request at INFO.
    pub fn log_request(
        &self,
        method: &str,
        path: &str,
        status_code: u16,
        duration: Duration,
        extra: Fields,
    ) -> Result<(), ValidationError> {
        self.log_with(Level::Info, None, || {
            let duration_ms = (duration.as_micros() as f64 / 10.0).round() / 100.0;
            let mut fields = fields! {
                "method" => method,
                "path" => path,
                "status_code" => status_code,
                "duration_ms" => duration_ms,
            };
            fields.extend(extra);
            (format!("{} {} - {}", method, path, status_code), fields)
        })
    }

    /// Dispatch an already-built record, bypassing the level gate.
    pub(crate) fn emit(&self, record: &LogRecord) -> DispatchReport {
        let report = self.dispatch(record);
        if self.persist_to_store() {
            if let Some(queue) = self.queue.get() {
                queue.submit(NewLogEntry::from_record(record));
            }
        }
        report
    }

    /// Sinks only; the caller takes care of persistence.
    pub(crate) fn dispatch(&self, record: &LogRecord) -> DispatchReport {
        self.sinks
            .dispatch(&self.name, record, self.options.reporter.as_ref())
    }

    /// Flush every sink and wait for queued records to reach the store.
    pub async fn flush(&self) {
        self.sinks.flush(&self.name, self.options.reporter.as_ref());
        if let Some(queue) = self.queue.get() {
            queue.flush().await;
        }
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("min_level", &self.min_level())
            .field("sinks", &self.sinks)
            .field("persist_to_store", &self.persist_to_store())
            .finish_non_exhaustive()
    }
}

fn error_type_name<E: StdError + ?Sized>(error: &E) -> String {
    let static_name = std::any::type_name::<E>();
    if !static_name.starts_with("dyn ") {
        return static_name.to_string();
    }
    let debug = format!("{:?}", error);
    let head: String = debug
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == ':')
        .collect();
    if head.is_empty() {
        static_name.to_string()
    } else {
        head
    }
}

fn describe_error<E: StdError + ?Sized>(type_name: &str, error: &E) -> String {
    let mut text = format!("{}: {}", type_name, error);
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str("\nCaused by: ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Format;
    use crate::memory::MemoryLogRepository;
    use crate::repository::LogFilter;
    use crate::writers::MemoryWriter;
    use std::sync::atomic::AtomicUsize;

    fn memory_logger(min_level: Level) -> (Logger, Arc<MemoryWriter>) {
        let writer = Arc::new(MemoryWriter::new());
        let config = LoggerConfig::new(min_level)
            .with_sink(SinkConfig::custom("mem", writer.clone()).with_format(Format::Json));
        (Logger::new("svc", config).unwrap(), writer)
    }

    fn parse(line: &str) -> serde_json::Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn gated_call_never_builds_the_record() {
        let (logger, writer) = memory_logger(Level::Warning);
        let calls = AtomicUsize::new(0);
        logger
            .log_with(Level::Info, None, || {
                calls.fetch_add(1, Ordering::SeqCst);
                ("expensive", Fields::new())
            })
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(writer.is_empty());
    }

    #[test]
    fn gated_call_skips_validation() {
        let (logger, writer) = memory_logger(Level::Error);
        // Below the gate even an invalid message is a silent no-op.
        logger.debug("", Fields::new()).unwrap();
        assert!(writer.is_empty());
    }

    #[test]
    fn every_level_below_the_gate_is_dropped() {
        for (i, gate) in Level::ALL.iter().enumerate() {
            let (logger, writer) = memory_logger(*gate);
            for level in &Level::ALL[..i] {
                logger.log(*level, "x", Fields::new()).unwrap();
            }
            assert!(writer.is_empty(), "gate {} let a lower level through", gate);
            logger.log(*gate, "x", Fields::new()).unwrap();
            assert_eq!(writer.len(), 1);
        }
    }

    #[test]
    fn empty_message_is_a_validation_error() {
        let (logger, writer) = memory_logger(Level::Debug);
        assert_eq!(
            logger.info("  ", Fields::new()).unwrap_err(),
            ValidationError::EmptyMessage
        );
        assert!(writer.is_empty());
    }

    #[test]
    fn location_is_rendered() {
        let (logger, writer) = memory_logger(Level::Debug);
        logger
            .log_at(
                Level::Info,
                "here",
                Fields::new(),
                SourceLocation::new("app").with_function("run").with_line(7),
            )
            .unwrap();
        let value = parse(&writer.lines()[0]);
        assert_eq!(value["module"], "app");
        assert_eq!(value["function"], "run");
        assert_eq!(value["line"], 7);
    }

    #[test]
    fn exception_captures_type_and_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);

        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("request failed")
            }
        }

        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let (logger, writer) = memory_logger(Level::Debug);
        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        logger
            .exception("upload failed", &err, fields! { "file" => "a.txt" })
            .unwrap();

        let value = parse(&writer.lines()[0]);
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["file"], "a.txt");
        assert!(value["exception_type"].as_str().unwrap().ends_with("Outer"));
        let exception = value["exception"].as_str().unwrap();
        assert!(exception.contains("request failed"));
        assert!(exception.contains("Caused by: disk full"));
    }

    #[test]
    fn log_request_fields() {
        let (logger, writer) = memory_logger(Level::Debug);
        logger
            .log_request("GET", "/health", 200, Duration::from_micros(12_345), Fields::new())
            .unwrap();
        let value = parse(&writer.lines()[0]);
        assert_eq!(value["message"], "GET /health - 200");
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["duration_ms"], 12.35);
    }

    #[test]
    fn failed_reconfigure_keeps_previous_config() {
        let (logger, writer) = memory_logger(Level::Info);
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), b"file").unwrap();

        let bad = LoggerConfig::new(Level::Debug)
            .with_sink(SinkConfig::custom("other", Arc::new(MemoryWriter::new())))
            .with_sink(SinkConfig::file(dir.path().join("blocker").join("app.log"), 0, 0));
        assert!(matches!(
            logger.reconfigure(bad),
            Err(ConfigError::SinkBuild { .. })
        ));

        assert_eq!(logger.min_level(), Level::Info);
        assert_eq!(logger.sinks().ids(), vec!["mem".to_string()]);
        logger.info("still works", Fields::new()).unwrap();
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn reconfigure_swaps_sinks_and_level() {
        let (logger, old) = memory_logger(Level::Info);
        let new = Arc::new(MemoryWriter::new());
        logger
            .reconfigure(
                LoggerConfig::new(Level::Debug)
                    .with_sink(SinkConfig::custom("new", new.clone()).with_format(Format::Text)),
            )
            .unwrap();

        logger.debug("after", Fields::new()).unwrap();
        assert!(old.is_empty());
        assert_eq!(new.len(), 1);
        assert_eq!(logger.snapshot().sink_ids, vec!["new".to_string()]);
    }

    #[test]
    fn duplicate_sink_ids_are_rejected() {
        let config = LoggerConfig::new(Level::Info)
            .with_sink(SinkConfig::custom("a", Arc::new(MemoryWriter::new())))
            .with_sink(SinkConfig::custom("a", Arc::new(MemoryWriter::new())));
        assert!(matches!(
            Logger::new("svc", config),
            Err(ConfigError::DuplicateSink(id)) if id == "a"
        ));
    }

    #[test]
    fn persistence_without_repository_is_rejected() {
        let config = LoggerConfig::new(Level::Info).with_persistence(true);
        assert!(matches!(
            Logger::new("svc", config),
            Err(ConfigError::MissingRepository(_))
        ));
    }

    #[tokio::test]
    async fn persists_records_when_enabled() {
        let repo = Arc::new(MemoryLogRepository::new());
        let writer = Arc::new(MemoryWriter::new());
        let config = LoggerConfig::new(Level::Info)
            .with_sink(SinkConfig::custom("mem", writer.clone()))
            .with_persistence(true);
        let logger = Logger::with_options(
            "svc",
            config,
            LoggerOptions::default().with_repository(repo.clone()),
        )
        .unwrap();

        logger.info("stored", fields! { "user" => "bob" }).unwrap();
        logger.debug("gated", Fields::new()).unwrap();
        logger.flush().await;

        let rows = repo.list(&LogFilter::default(), 0, 10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message, "stored");
        assert_eq!(rows[0].logger, "svc");
        assert_eq!(rows[0].fields["user"], "bob");
        assert_eq!(logger.persist_stats().unwrap().persisted, 1);
    }

    #[derive(Debug)]
    struct DbTimeout {
        ms: u64,
    }

    impl fmt::Display for DbTimeout {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "query timed out after {}ms", self.ms)
        }
    }

    impl StdError for DbTimeout {}

    #[test]
    fn boxed_error_records_concrete_type() {
        let (logger, writer) = memory_logger(Level::Debug);
        let err: Box<dyn StdError + Send + Sync> = Box::new(DbTimeout { ms: 30 });
        logger.exception("query failed", &*err, Fields::new()).unwrap();

        let value = parse(&writer.lines()[0]);
        assert_eq!(value["exception_type"], "DbTimeout");
        assert_eq!(
            value["exception"],
            "DbTimeout: query timed out after 30ms"
        );
    }

    #[test]
    fn concrete_error_keeps_full_type_path() {
        let (logger, writer) = memory_logger(Level::Debug);
        logger
            .exception("query failed", &DbTimeout { ms: 5 }, Fields::new())
            .unwrap();
        let value = parse(&writer.lines()[0]);
        assert!(value["exception_type"].as_str().unwrap().ends_with("::DbTimeout"));
    }

    #[test]
    fn exception_at_carries_location() {
        let (logger, writer) = memory_logger(Level::Debug);
        logger
            .exception_at(
                "query failed",
                &DbTimeout { ms: 5 },
                Fields::new(),
                SourceLocation::new("db").with_function("fetch").with_line(12),
            )
            .unwrap();
        let value = parse(&writer.lines()[0]);
        assert_eq!(value["module"], "db");
        assert_eq!(value["function"], "fetch");
        assert_eq!(value["line"], 12);
    }

    #[test]
    fn update_config_edits_latest_config() {
        let (logger, writer) = memory_logger(Level::Info);
        logger.set_level(Level::Error);
        logger
            .update_config(|config| config.persist_to_store = false)
            .unwrap();

        // The level set just before the edit survives it.
        assert_eq!(logger.min_level(), Level::Error);
        assert_eq!(logger.config().min_level, Level::Error);
        logger.warning("gated", Fields::new()).unwrap();
        assert!(writer.is_empty());
    }

    #[test]
    fn failed_update_config_keeps_previous_config() {
        let (logger, _writer) = memory_logger(Level::Info);
        let result = logger.update_config(|config| {
            config.min_level = Level::Debug;
            config.persist_to_store = true;
        });
        assert!(matches!(result, Err(ConfigError::MissingRepository(_))));
        assert_eq!(logger.min_level(), Level::Info);
        assert!(!logger.persist_to_store());
    }

    #[test]
    fn reconfigure_publishes_level_with_sinks() {
        let (logger, _old) = memory_logger(Level::Error);
        let new = Arc::new(MemoryWriter::new());
        logger
            .reconfigure(
                LoggerConfig::new(Level::Debug).with_sink(SinkConfig::custom("new", new.clone())),
            )
            .unwrap();
        assert!(logger.enabled(Level::Debug));
        logger.debug("visible", Fields::new()).unwrap();
        assert_eq!(new.len(), 1);
    }

    #[test]
    fn set_level_updates_gate_and_config() {
        let (logger, writer) = memory_logger(Level::Error);
        logger.set_level(Level::Debug);
        logger.debug("now visible", Fields::new()).unwrap();
        assert_eq!(writer.len(), 1);
        assert_eq!(logger.config().min_level, Level::Debug);
    }
}
