use std::sync::Arc;
use std::time::Instant;

use log_recorder::{
    fields, Format, Level, LogFilter, LogRepository, Logger, LoggerConfig, LoggerOptions,
    MemoryLogRepository, NoopWriter, SinkConfig,
};

/// Direct emission (no `tracing` bridge) with text rendering and every
/// record persisted to an in-memory store.
#[tokio::main]
async fn main() {
    let repo = Arc::new(MemoryLogRepository::new());
    let config = LoggerConfig::new(Level::Debug)
        .with_sink(SinkConfig::custom("noop", Arc::new(NoopWriter)).with_format(Format::Text))
        .with_persistence(true);
    let options = LoggerOptions {
        queue_capacity: 50_000,
        ..LoggerOptions::default().with_repository(repo.clone())
    };

    let logger = match Logger::with_options("load", config, options) {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("failed to build logger: {}", e);
            return;
        }
    };

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        let _ = logger.error("custom load test error", fields! { "iteration" => i });
    }

    let elapsed = start.elapsed();
    println!("custom config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.flush().await;
    let stored = repo.count(&LogFilter::default()).await.unwrap_or(0);
    println!("persisted {} rows, stats {:?}", stored, logger.persist_stats());
}
