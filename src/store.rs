use std::sync::Arc;

use crate::error::StorageError;
use crate::memory::MemoryLogRepository;
use crate::repository::LogRepository;

/// Supported store kinds that can be selected via URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

/// Store selection built from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Raw URL that was used to construct this config.
    pub url: String,
}

impl StoreConfig {
    pub fn new(kind: StoreKind, url: impl Into<String>) -> Self {
        StoreConfig {
            kind,
            url: url.into(),
        }
    }
}

/// Parse a store URL and infer the store kind from its scheme.
///
/// Examples:
/// - "memory://"
/// - "sqlite://./logs.db"
/// - "sqlite::memory:"
pub fn parse_store_url(url: &str) -> Result<StoreConfig, StoreUrlError> {
    let lower = url.trim().to_ascii_lowercase();

    if lower.starts_with("memory://") || lower == "memory" {
        Ok(StoreConfig::new(StoreKind::Memory, url))
    } else if lower.starts_with("sqlite:") {
        Ok(StoreConfig::new(StoreKind::Sqlite, url))
    } else {
        Err(StoreUrlError::UnknownScheme(url.to_string()))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum StoreUrlError {
    #[error("unknown or unsupported store url: {0}")]
    UnknownScheme(String),
}

/// Error returned when opening a store from configuration.
#[derive(thiserror::Error, Debug)]
pub enum StoreOpenError {
    #[error("sqlite feature is not enabled")]
    SqliteFeatureDisabled,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Open the repository described by `cfg`.
///
/// This is the entry point for applications that select their store with a
/// single URL instead of constructing repositories by hand.
pub async fn open_repository(cfg: &StoreConfig) -> Result<Arc<dyn LogRepository>, StoreOpenError> {
    match cfg.kind {
        StoreKind::Memory => Ok(Arc::new(MemoryLogRepository::new())),
        StoreKind::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                let repo = crate::sqlite::SqliteLogRepository::connect(&cfg.url).await?;
                tracing::info!(url = %cfg.url, "opened sqlite log store");
                Ok(Arc::new(repo) as Arc<dyn LogRepository>)
            }

            #[cfg(not(feature = "sqlite"))]
            {
                let _ = cfg;
                Err(StoreOpenError::SqliteFeatureDisabled)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use crate::repository::NewLogEntry;

    #[test]
    fn parses_known_schemes() {
        assert_eq!(parse_store_url("memory://").unwrap().kind, StoreKind::Memory);
        assert_eq!(parse_store_url("sqlite://./logs.db").unwrap().kind, StoreKind::Sqlite);
        assert_eq!(parse_store_url("SQLITE::memory:").unwrap().kind, StoreKind::Sqlite);
        assert!(matches!(
            parse_store_url("postgres://localhost/db"),
            Err(StoreUrlError::UnknownScheme(_))
        ));
    }

    #[tokio::test]
    async fn opens_memory_store() {
        let cfg = parse_store_url("memory://").unwrap();
        let repo = open_repository(&cfg).await.unwrap();
        let row = repo.create(NewLogEntry::new(Level::Info, "hi")).await.unwrap();
        assert_eq!(repo.get_by_id(row.id).await.unwrap().unwrap().message, "hi");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn opens_sqlite_store() {
        let cfg = parse_store_url("sqlite::memory:").unwrap();
        let repo = open_repository(&cfg).await.unwrap();
        let row = repo.create(NewLogEntry::new(Level::Warning, "disk")).await.unwrap();
        assert_eq!(repo.get_by_id(row.id).await.unwrap().unwrap().level, Level::Warning);
    }
}
