use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::LogRecord;

/// Keys the JSON layout always writes. A field with one of these names is
/// dropped from the rendered object; the record's own value wins.
pub const RESERVED_KEYS: [&str; 8] = [
    "timestamp",
    "level",
    "logger",
    "message",
    "module",
    "function",
    "line",
    "exception",
];

/// Wire representation a sink renders records into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Single-line JSON object, fields merged at the top level.
    #[default]
    Json,
    /// `timestamp - logger - LEVEL - function:line - message | key=value ...`
    Text,
}

impl Format {
    /// Render a record. Pure; never fails for a constructed record.
    pub fn render(&self, record: &LogRecord) -> String {
        match self {
            Format::Json => render_json(record),
            Format::Text => render_text(record),
        }
    }
}

fn timestamp(record: &LogRecord) -> String {
    record
        .timestamp()
        .to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn render_json(record: &LogRecord) -> String {
    let location = record.location();
    let mut object = Map::new();
    object.insert("timestamp".into(), Value::String(timestamp(record)));
    object.insert("level".into(), Value::String(record.level().to_string()));
    object.insert("logger".into(), Value::String(record.logger().to_string()));
    object.insert("message".into(), Value::String(record.message().to_string()));
    object.insert("module".into(), location.module.clone().into());
    object.insert("function".into(), location.function.clone().into());
    object.insert("line".into(), location.line.into());

    for (key, value) in record.fields() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        object.insert(key.clone(), value.clone());
    }

    if let Some(exception) = record.exception() {
        object.insert("exception".into(), Value::String(exception.to_string()));
    }

    serde_json::to_string(&object).unwrap_or_else(|_| format!("{:?}", object))
}

fn render_text(record: &LogRecord) -> String {
    let location = record.location();
    let line = location
        .line
        .map(|l| l.to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut out = format!(
        "{} - {} - {} - {}:{} - {}",
        timestamp(record),
        record.logger(),
        record.level(),
        location.function.as_deref().unwrap_or("-"),
        line,
        record.message(),
    );

    if !record.fields().is_empty() {
        let pairs: Vec<String> = record
            .fields()
            .iter()
            .map(|(key, value)| format!("{}={}", key, text_value(value)))
            .collect();
        out.push_str(" | ");
        out.push_str(&pairs.join(" "));
    }

    if let Some(exception) = record.exception() {
        out.push('\n');
        out.push_str(exception);
    }

    out
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
    }
}
