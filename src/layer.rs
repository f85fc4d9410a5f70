use std::sync::Arc;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

use crate::fallback::LoggingFailure;
use crate::level::Level;
use crate::logger::Logger;
use crate::record::{Fields, SourceLocation};

/// Targets skipped by default so the pipeline never logs its own
/// diagnostics (or those of its store driver) back into itself.
pub const DEFAULT_IGNORED_TARGETS: [&str; 2] = ["log_recorder", "sqlx"];

/// `tracing_subscriber` layer that turns `tracing` events into records of a
/// [`Logger`].
///
/// The logger's level gate applies as usual. Events without a `message`
/// field use the event name as their message.
pub struct BridgeLayer {
    logger: Arc<Logger>,
    ignored_targets: Vec<String>,
}

impl BridgeLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        BridgeLayer {
            logger,
            ignored_targets: DEFAULT_IGNORED_TARGETS.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Also skip events whose target starts with `prefix`.
    pub fn ignore_target(mut self, prefix: impl Into<String>) -> Self {
        self.ignored_targets.push(prefix.into());
        self
    }

    fn ignored(&self, target: &str) -> bool {
        self.ignored_targets.iter().any(|t| target.starts_with(t.as_str()))
    }
}

/// Map a `tracing` level onto the pipeline's levels. TRACE folds into DEBUG.
pub fn map_level(level: &tracing::Level) -> Level {
    match *level {
        tracing::Level::ERROR => Level::Error,
        tracing::Level::WARN => Level::Warning,
        tracing::Level::INFO => Level::Info,
        _ => Level::Debug,
    }
}

impl<S> Layer<S> for BridgeLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        let level = map_level(meta.level());
        if !self.logger.enabled(level) || self.ignored(meta.target()) {
            return;
        }

        let location = SourceLocation {
            module: meta.module_path().map(|s| s.to_string()),
            function: None,
            line: meta.line(),
        };

        let result = self.logger.log_with(level, Some(location), || {
            let mut fields = Fields::new();
            let mut message: Option<String> = None;
            let mut visitor = FieldVisitor {
                fields: &mut fields,
                message: &mut message,
            };
            event.record(&mut visitor);

            fields.insert("target".to_string(), meta.target().into());
            let message = message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| meta.name().to_string());
            (message, fields)
        });
        // The message is never blank here, but it can be too long.
        if let Err(error) = result {
            self.logger.report(&LoggingFailure::Invalid {
                logger: self.logger.name(),
                error: &error,
            });
        }
    }
}

pub struct FieldVisitor<'a> {
    pub fields: &'a mut Fields,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            *self.message = Some(text);
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackReporter;
    use crate::format::Format;
    use crate::logger::{LoggerConfig, LoggerOptions};
    use crate::sink::SinkConfig;
    use crate::writers::MemoryWriter;
    use std::sync::Mutex;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::Registry;

    fn bridged(min_level: Level) -> (BridgeLayer, Arc<MemoryWriter>) {
        let writer = Arc::new(MemoryWriter::new());
        let config = LoggerConfig::new(min_level)
            .with_sink(SinkConfig::custom("mem", writer.clone()).with_format(Format::Json));
        let logger = Arc::new(Logger::new("bridge", config).unwrap());
        (BridgeLayer::new(logger), writer)
    }

    #[test]
    fn events_become_records() {
        let (layer, writer) = bridged(Level::Info);
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app::db", code = 500, retry = false, "query failed");
            tracing::debug!(target: "app::db", "below the gate");
        });

        let lines = writer.lines();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["message"], "query failed");
        assert_eq!(value["code"], 500);
        assert_eq!(value["retry"], false);
        assert_eq!(value["target"], "app::db");
        assert_eq!(value["logger"], "bridge");
    }

    #[test]
    fn own_targets_are_ignored() {
        let (layer, writer) = bridged(Level::Debug);
        let subscriber = Registry::default().with(layer.ignore_target("noisy"));
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "log_recorder::fallback", "loop");
            tracing::warn!(target: "noisy::module", "skip");
            tracing::warn!(target: "app", "kept");
        });
        assert_eq!(writer.len(), 1);
    }

    #[derive(Default)]
    struct RecordingReporter {
        messages: Mutex<Vec<String>>,
    }

    impl FallbackReporter for RecordingReporter {
        fn report(&self, failure: &LoggingFailure<'_>) {
            self.messages.lock().unwrap().push(failure.to_string());
        }
    }

    #[test]
    fn rejected_event_is_reported() {
        let writer = Arc::new(MemoryWriter::new());
        let reporter = Arc::new(RecordingReporter::default());
        let config = LoggerConfig::new(Level::Debug).with_sink(SinkConfig::custom("mem", writer.clone()));
        let logger = Logger::with_options(
            "bridge",
            config,
            LoggerOptions::default().with_reporter(reporter.clone()),
        )
        .unwrap();

        let subscriber = Registry::default().with(BridgeLayer::new(Arc::new(logger)));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "app", "{}", "x".repeat(1500));
        });

        assert!(writer.is_empty());
        let messages = reporter.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("bridge"));
        assert!(messages[0].contains("1500"));
    }

    #[test]
    fn level_mapping() {
        assert_eq!(map_level(&tracing::Level::TRACE), Level::Debug);
        assert_eq!(map_level(&tracing::Level::WARN), Level::Warning);
        assert_eq!(map_level(&tracing::Level::ERROR), Level::Error);
    }
}
