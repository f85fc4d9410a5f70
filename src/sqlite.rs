use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::{RepositoryError, StorageError};
use crate::level::Level;
use crate::record::Fields;
use crate::repository::{
    validate_page, LogEntryPatch, LogFilter, LogRepository, NewLogEntry, StoredLogEntry,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS log_entries (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   INTEGER NOT NULL,
    level       TEXT    NOT NULL,
    logger      TEXT    NOT NULL DEFAULT '',
    message     TEXT    NOT NULL,
    module      TEXT,
    function    TEXT,
    line        INTEGER,
    fields      TEXT    NOT NULL DEFAULT '{}',
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER
);
CREATE INDEX IF NOT EXISTS idx_log_entries_timestamp ON log_entries (timestamp);
CREATE INDEX IF NOT EXISTS idx_log_entries_level ON log_entries (level);
";

const COLUMNS: &str =
    "id, timestamp, level, logger, message, module, function, line, fields, created_at, updated_at";

/// SQLite-backed [`LogRepository`].
///
/// Timestamps are stored as microseconds since the Unix epoch and `fields`
/// as a JSON object. Each mutation runs in its own transaction.
#[derive(Debug, Clone)]
pub struct SqliteLogRepository {
    pool: SqlitePool,
}

impl SqliteLogRepository {
    /// Open (or create) the database at `url`, e.g. `sqlite://./logs.db` or
    /// `sqlite::memory:`.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let in_memory = url.contains(":memory:");
        let opts = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let opts = if in_memory {
            opts
        } else {
            opts.journal_mode(SqliteJournalMode::Wal)
        };

        // Each connection to `:memory:` is its own database, so keep exactly
        // one alive for the pool's lifetime.
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(Option::<Duration>::None)
                .max_lifetime(Option::<Duration>::None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_opts.connect_with(opts).await?;
        Self::from_pool(pool).await
    }

    pub async fn in_memory() -> Result<Self, StorageError> {
        Self::connect("sqlite::memory:").await
    }

    /// Wrap an existing pool, creating the table if needed.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        tracing::debug!("log_entries schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn from_micros(value: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::<Utc>::from_timestamp_micros(value)
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp {} out of range", value)))
}

fn decode_row(row: &SqliteRow) -> Result<StoredLogEntry, StorageError> {
    let level: String = row.try_get("level")?;
    let level = level
        .parse::<Level>()
        .map_err(|e| StorageError::Corrupt(e.to_string()))?;
    let line: Option<i64> = row.try_get("line")?;
    let line = line
        .map(u32::try_from)
        .transpose()
        .map_err(|e| StorageError::Corrupt(format!("line: {}", e)))?;
    let fields: String = row.try_get("fields")?;
    let fields: Fields = serde_json::from_str(&fields)?;
    let updated_at: Option<i64> = row.try_get("updated_at")?;

    Ok(StoredLogEntry {
        id: row.try_get("id")?,
        timestamp: from_micros(row.try_get("timestamp")?)?,
        level,
        logger: row.try_get("logger")?,
        message: row.try_get("message")?,
        module: row.try_get("module")?,
        function: row.try_get("function")?,
        line,
        fields,
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: updated_at.map(from_micros).transpose()?,
    })
}

fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &LogFilter) {
    builder.push(" WHERE 1 = 1");
    if let Some(level) = filter.level {
        builder.push(" AND level = ").push_bind(level.as_str());
    }
    if let Some(logger) = &filter.logger {
        builder.push(" AND logger = ").push_bind(logger.clone());
    }
    if let Some(start) = filter.start_time {
        builder.push(" AND timestamp >= ").push_bind(micros(start));
    }
    if let Some(end) = filter.end_time {
        builder.push(" AND timestamp <= ").push_bind(micros(end));
    }
}

async fn fetch_by_id<'e, E>(executor: E, id: i64) -> Result<Option<StoredLogEntry>, StorageError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!("SELECT {} FROM log_entries WHERE id = ?1", COLUMNS))
        .bind(id)
        .fetch_optional(executor)
        .await?;
    row.as_ref().map(decode_row).transpose()
}

#[async_trait]
impl LogRepository for SqliteLogRepository {
    async fn create(&self, entry: NewLogEntry) -> Result<StoredLogEntry, RepositoryError> {
        let mut row = entry.into_row(Utc::now())?;
        let fields = serde_json::to_string(&row.fields).map_err(StorageError::from)?;

        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let result = sqlx::query(
            "INSERT INTO log_entries (
                timestamp, level, logger, message, module, function, line, fields, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(micros(row.timestamp))
        .bind(row.level.as_str())
        .bind(row.logger.as_str())
        .bind(row.message.as_str())
        .bind(row.module.as_deref())
        .bind(row.function.as_deref())
        .bind(row.line.map(i64::from))
        .bind(fields)
        .bind(micros(row.created_at))
        .execute(&mut *tx)
        .await
        .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;

        row.id = result.last_insert_rowid();
        Ok(row)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<StoredLogEntry>, StorageError> {
        fetch_by_id(&self.pool, id).await
    }

    async fn list(
        &self,
        filter: &LogFilter,
        skip: u64,
        limit: u32,
    ) -> Result<Vec<StoredLogEntry>, RepositoryError> {
        validate_page(skip, limit)?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM log_entries", COLUMNS));
        push_filter(&mut builder, filter);
        builder
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(skip as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        let entries = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn count(&self, filter: &LogFilter) -> Result<u64, StorageError> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM log_entries");
        push_filter(&mut builder, filter);
        let count: i64 = builder.build().fetch_one(&self.pool).await?.try_get(0)?;
        Ok(count as u64)
    }

    async fn update(
        &self,
        id: i64,
        patch: LogEntryPatch,
    ) -> Result<Option<StoredLogEntry>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let Some(current) = fetch_by_id(&mut *tx, id).await? else {
            return Ok(None);
        };
        // Dropping `tx` on the error path rolls back.
        let next = patch.apply(&current, Utc::now())?;
        let fields = serde_json::to_string(&next.fields).map_err(StorageError::from)?;

        sqlx::query(
            "UPDATE log_entries SET
                level      = ?2,
                message    = ?3,
                module     = ?4,
                function   = ?5,
                line       = ?6,
                fields     = ?7,
                updated_at = ?8
             WHERE id = ?1",
        )
        .bind(id)
        .bind(next.level.as_str())
        .bind(next.message.as_str())
        .bind(next.module.as_deref())
        .bind(next.function.as_deref())
        .bind(next.line.map(i64::from))
        .bind(fields)
        .bind(next.updated_at.map(micros))
        .execute(&mut *tx)
        .await
        .map_err(StorageError::from)?;
        tx.commit().await.map_err(StorageError::from)?;

        Ok(Some(next))
    }

    async fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM log_entries WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM log_entries").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
