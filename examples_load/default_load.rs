use std::sync::Arc;
use std::time::Instant;
use tracing::error;

use log_recorder::init::init_tracing;
use log_recorder::{Level, Logger, LoggerConfig, NoopWriter, SinkConfig};

#[tokio::main]
async fn main() {
    let config = LoggerConfig::new(Level::Info).with_sink(SinkConfig::custom("noop", Arc::new(NoopWriter)));
    let logger = match Logger::new("load", config) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            eprintln!("failed to build logger: {}", e);
            return;
        }
    };
    if let Err(e) = init_tracing(Arc::clone(&logger)) {
        eprintln!("failed to install bridge: {}", e);
        return;
    }

    let n: u64 = 100_000;
    let start = Instant::now();

    for i in 0..n {
        error!(iteration = i, "default load test error");
    }

    let elapsed = start.elapsed();
    println!("default config: sent {} events in {:?} (~{:.0} ev/s)",
        n,
        elapsed,
        n as f64 / elapsed.as_secs_f64()
    );

    logger.flush().await;
}
