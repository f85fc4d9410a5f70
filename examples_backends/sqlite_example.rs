use std::sync::Arc;

use log_recorder::env::LoggingSettings;
use log_recorder::service::LogService;
use log_recorder::store::{open_repository, parse_store_url};
use log_recorder::{fields, CreateEntryRequest, Level, LogQuery, LoggerOptions, LoggerRegistry};

/// Configure a logger from `LOG_*` environment variables and persist to the
/// SQLite store named by `LOG_DATABASE_URL` (default `sqlite://./logs.db`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = LoggingSettings::from_env();
    let store = parse_store_url(&settings.database_url)?;
    let repo = open_repository(&store).await?;

    let registry = LoggerRegistry::new(LoggerOptions::default().with_repository(Arc::clone(&repo)));
    let logger = registry.get_or_create("sqlite-example", settings.logger_config().with_persistence(true))?;

    logger.info("sqlite example started", fields! { "url" => settings.database_url.as_str() })?;
    logger.error("simulated failure", fields! { "code" => 500 })?;
    logger.flush().await;

    let service = LogService::new(Arc::clone(&logger), repo);
    service
        .create_entry(CreateEntryRequest::new(Level::Warning, "entry created through the service"))
        .await?;

    let page = service
        .query(&LogQuery {
            logger: Some("sqlite-example".into()),
            limit: 10,
            ..Default::default()
        })
        .await?;
    for entry in &page.entries {
        println!("#{} {} {} {}", entry.id, entry.timestamp, entry.level, entry.message);
    }
    println!("{} matching rows", page.total);
    Ok(())
}
