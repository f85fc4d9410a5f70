use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::ConfigError;
use crate::fallback::{FallbackReporter, LoggingFailure};
use crate::repository::{LogRepository, NewLogEntry};

/// Default capacity of the persistence queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

enum Command {
    Persist(NewLogEntry),
    Flush(oneshot::Sender<()>),
}

/// Counters kept by the persistence worker.
#[derive(Debug, Default)]
pub struct PersistStats {
    /// Accepted into the queue.
    pub enqueued: AtomicU64,
    /// Written to the repository.
    pub persisted: AtomicU64,
    /// Rejected by the repository.
    pub failed: AtomicU64,
    /// Dropped because the queue was full or closed.
    pub dropped: AtomicU64,
}

impl PersistStats {
    pub fn snapshot(&self) -> PersistCounts {
        PersistCounts {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            persisted: self.persisted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistCounts {
    pub enqueued: u64,
    pub persisted: u64,
    pub failed: u64,
    pub dropped: u64,
}

/// Hands records to a background task that writes them to the repository.
///
/// The emitting thread never waits on storage: `submit` is a `try_send` on a
/// bounded channel. A single worker drains the queue, so one logger's
/// records reach the store in emission order.
pub struct PersistQueue {
    logger: String,
    sender: mpsc::Sender<Command>,
    stats: Arc<PersistStats>,
    reporter: Arc<dyn FallbackReporter>,
    _worker: JoinHandle<()>,
}

impl PersistQueue {
    /// Spawn the worker on the current tokio runtime.
    pub fn spawn(
        logger: &str,
        repository: Arc<dyn LogRepository>,
        reporter: Arc<dyn FallbackReporter>,
        capacity: usize,
    ) -> Result<Self, ConfigError> {
        let handle = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;
        let (tx, mut rx) = mpsc::channel::<Command>(capacity.max(16));
        let stats = Arc::new(PersistStats::default());

        let stats_bg = Arc::clone(&stats);
        let reporter_bg = Arc::clone(&reporter);
        let logger_bg = logger.to_string();

        let worker = handle.spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Persist(entry) => match repository.create(entry).await {
                        Ok(_) => {
                            stats_bg.persisted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(error) => {
                            stats_bg.failed.fetch_add(1, Ordering::Relaxed);
                            reporter_bg.report(&LoggingFailure::Persist {
                                logger: &logger_bg,
                                error: &error,
                            });
                        }
                    },
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            tracing::debug!(logger = %logger_bg, "persistence worker stopped");
        });

        Ok(PersistQueue {
            logger: logger.to_string(),
            sender: tx,
            stats,
            reporter,
            _worker: worker,
        })
    }

    /// Queue an entry; on a full or closed queue it is dropped and reported.
    pub fn submit(&self, entry: NewLogEntry) {
        match self.sender.try_send(Command::Persist(entry)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                self.reporter.report(&LoggingFailure::PersistDropped {
                    logger: &self.logger,
                });
            }
        }
    }

    /// Wait until every entry queued before this call has been handled.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Command::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub fn stats(&self) -> PersistCounts {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RepositoryError, StorageError};
    use crate::level::Level;
    use crate::memory::MemoryLogRepository;
    use crate::repository::{LogEntryPatch, LogFilter, StoredLogEntry};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        messages: Mutex<Vec<String>>,
    }

    impl FallbackReporter for RecordingReporter {
        fn report(&self, failure: &LoggingFailure<'_>) {
            self.messages.lock().unwrap().push(failure.to_string());
        }
    }

    struct DownRepository;

    #[async_trait]
    impl LogRepository for DownRepository {
        async fn create(&self, _entry: NewLogEntry) -> Result<StoredLogEntry, RepositoryError> {
            Err(StorageError::Unavailable("down".into()).into())
        }
        async fn get_by_id(&self, _id: i64) -> Result<Option<StoredLogEntry>, StorageError> {
            Ok(None)
        }
        async fn list(
            &self,
            _filter: &LogFilter,
            _skip: u64,
            _limit: u32,
        ) -> Result<Vec<StoredLogEntry>, RepositoryError> {
            Ok(Vec::new())
        }
        async fn count(&self, _filter: &LogFilter) -> Result<u64, StorageError> {
            Ok(0)
        }
        async fn update(
            &self,
            _id: i64,
            _patch: LogEntryPatch,
        ) -> Result<Option<StoredLogEntry>, RepositoryError> {
            Ok(None)
        }
        async fn delete(&self, _id: i64) -> Result<bool, StorageError> {
            Ok(false)
        }
        async fn delete_all(&self) -> Result<u64, StorageError> {
            Ok(0)
        }
    }

    #[test]
    fn spawn_outside_runtime_fails() {
        let result = PersistQueue::spawn(
            "svc",
            Arc::new(MemoryLogRepository::new()),
            Arc::new(RecordingReporter::default()),
            DEFAULT_QUEUE_CAPACITY,
        );
        assert!(matches!(result, Err(ConfigError::NoRuntime)));
    }

    #[tokio::test]
    async fn persists_in_order() {
        let repo = Arc::new(MemoryLogRepository::new());
        let queue = PersistQueue::spawn(
            "svc",
            repo.clone(),
            Arc::new(RecordingReporter::default()),
            DEFAULT_QUEUE_CAPACITY,
        )
        .unwrap();

        for i in 0..5 {
            queue.submit(NewLogEntry::new(Level::Info, format!("m{}", i)));
        }
        queue.flush().await;

        let stats = queue.stats();
        assert_eq!(stats.enqueued, 5);
        assert_eq!(stats.persisted, 5);
        // Ids follow submission order.
        for (i, id) in (1..=5).enumerate() {
            let row = repo.get_by_id(id).await.unwrap().unwrap();
            assert_eq!(row.message, format!("m{}", i));
        }
    }

    #[tokio::test]
    async fn storage_failure_is_reported_not_raised() {
        let reporter = Arc::new(RecordingReporter::default());
        let queue = PersistQueue::spawn(
            "svc",
            Arc::new(DownRepository),
            reporter.clone(),
            DEFAULT_QUEUE_CAPACITY,
        )
        .unwrap();

        queue.submit(NewLogEntry::new(Level::Error, "lost"));
        queue.flush().await;

        assert_eq!(queue.stats().failed, 1);
        let messages = reporter.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("down"));
    }
}
