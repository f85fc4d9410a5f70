use std::sync::Arc;

use log_recorder::{fields, Format, Level, Logger, LoggerConfig, SinkConfig, SinkError, SinkWriter};

/// Example of plugging in a completely custom destination by implementing
/// `SinkWriter`. Imagine this talks to some proprietary collector for which
/// this crate does not ship a writer.
struct MyCollectorWriter;

impl SinkWriter for MyCollectorWriter {
    fn write_line(&self, line: &str) -> Result<(), SinkError> {
        // Here you would call your own client library.
        println!("[my-collector] {}", line);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = LoggerConfig::new(Level::Debug)
        .with_sink(SinkConfig::stdout().with_format(Format::Text))
        .with_sink(
            SinkConfig::custom("collector", Arc::new(MyCollectorWriter))
                .with_threshold(Level::Error),
        );
    let logger = Logger::new("custom-writer", config)?;

    logger.info("custom writer example started", fields! {})?;
    logger.error("sent to both sinks", fields! { "collector" => "my-collector" })?;
    Ok(())
}
