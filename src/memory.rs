use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{RepositoryError, StorageError};
use crate::repository::{
    validate_page, LogEntryPatch, LogFilter, LogRepository, NewLogEntry, StoredLogEntry,
};

#[derive(Default)]
struct State {
    next_id: i64,
    rows: BTreeMap<i64, StoredLogEntry>,
}

/// Process-local [`LogRepository`].
///
/// Every operation runs under a single lock, so mutations are serialized
/// and a row is only inserted once it is fully built.
#[derive(Default)]
pub struct MemoryLogRepository {
    state: RwLock<State>,
}

impl MemoryLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(a: &StoredLogEntry, b: &StoredLogEntry) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id))
}

#[async_trait]
impl LogRepository for MemoryLogRepository {
    async fn create(&self, entry: NewLogEntry) -> Result<StoredLogEntry, RepositoryError> {
        let mut row = entry.into_row(Utc::now())?;
        let mut state = self.state.write().await;
        state.next_id += 1;
        row.id = state.next_id;
        state.rows.insert(row.id, row.clone());
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<StoredLogEntry>, StorageError> {
        Ok(self.state.read().await.rows.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &LogFilter,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<StoredLogEntry>, RepositoryError> {
        validate_page(skip, limit)?;
        let state = self.state.read().await;
        let mut matching: Vec<&StoredLogEntry> =
            state.rows.values().filter(|row| filter.matches(row)).collect();
        matching.sort_by(|a, b| newest_first(a, b));

        Ok(matching
            .into_iter()
            .skip(usize::try_from(skip).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &LogFilter) -> Result<u64, StorageError> {
        let state = self.state.read().await;
        Ok(state.rows.values().filter(|row| filter.matches(row)).count() as u64)
    }

    async fn update(
        &self,
        id: i64,
        patch: LogEntryPatch,
    ) -> Result<Option<StoredLogEntry>, RepositoryError> {
        let mut state = self.state.write().await;
        let Some(current) = state.rows.get(&id) else {
            return Ok(None);
        };
        let next = patch.apply(current, Utc::now())?;
        state.rows.insert(id, next.clone());
        Ok(Some(next))
    }

    async fn delete(&self, id: i64) -> Result<bool, StorageError> {
        Ok(self.state.write().await.rows.remove(&id).is_some())
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let mut state = self.state.write().await;
        let count = state.rows.len() as u64;
        state.rows.clear();
        Ok(count)
    }
}
