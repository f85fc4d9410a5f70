use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::ConfigError;
use crate::fallback::FallbackReporter;
use crate::logger::{Logger, LoggerConfig, LoggerOptions};
use crate::repository::LogRepository;

/// Name → logger cache guaranteeing one instance per name.
///
/// Construct one at startup and hand out references; there is no hidden
/// global. The options given here (repository, fallback reporter) are
/// shared by every logger the registry creates.
pub struct LoggerRegistry {
    options: LoggerOptions,
    loggers: Mutex<HashMap<String, Arc<Logger>>>,
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        LoggerRegistry::new(LoggerOptions::default())
    }
}

impl LoggerRegistry {
    pub fn new(options: LoggerOptions) -> Self {
        LoggerRegistry {
            options,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_repository(repository: Arc<dyn LogRepository>) -> Self {
        LoggerRegistry::new(LoggerOptions::default().with_repository(repository))
    }

    pub fn repository(&self) -> Option<&Arc<dyn LogRepository>> {
        self.options.repository.as_ref()
    }

    pub fn reporter(&self) -> &Arc<dyn FallbackReporter> {
        &self.options.reporter
    }

    /// Return the logger registered under `name`, creating it from `config`
    /// if there is none.
    ///
    /// On a repeat call `config` is ignored, not merged: the first
    /// configuration wins until [`Logger::reconfigure`] is called. The lookup
    /// and insert happen under one lock, so concurrent first calls for the
    /// same name still produce a single instance.
    pub fn get_or_create(&self, name: &str, config: LoggerConfig) -> Result<Arc<Logger>, ConfigError> {
        let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = loggers.get(name) {
            return Ok(Arc::clone(existing));
        }
        let logger = Arc::new(Logger::with_options(name, config, self.options.clone())?);
        loggers.insert(name.to_string(), Arc::clone(&logger));
        Ok(logger)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Logger>> {
        self.loggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .loggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.loggers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every logger and detach its sinks.
    ///
    /// Handles still held elsewhere keep working but write nowhere.
    pub fn reset(&self) {
        let drained: Vec<Arc<Logger>> = {
            let mut loggers = self.loggers.lock().unwrap_or_else(PoisonError::into_inner);
            loggers.drain().map(|(_, logger)| logger).collect()
        };
        for logger in &drained {
            logger.sinks().clear();
        }
        tracing::debug!(count = drained.len(), "logger registry reset");
    }
}
