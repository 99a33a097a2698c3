use async_trait::async_trait;
use jiff::Timestamp;
use lapse_core::error::{Result, StorageError};
use lapse_core::repository::{NewUrlRecord, ReadRepository, Repository, UrlRecord};
use lapse_core::shortcode::ShortCode;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

/// DDL for the `short_urls` table. Safe to run repeatedly.
pub const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

const RECORD_COLUMNS: &str = "short_code, original_url, expire_at, created_at, updated_at";

/// MySQL implementation of the repository contract.
///
/// Timestamps are stored as Unix milliseconds. The `UNIQUE` key on
/// `short_code` is what keeps codes unique under concurrent inserts; the
/// service's existence check is only a pre-check. Deletes are hard deletes,
/// so a swept code may be issued again.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the `short_urls` table if it does not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn fetch_all(&self, sql: &str, now: Timestamp) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(sql)
            .bind(now.as_millisecond())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_record).collect()
    }
}

fn parse_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn row_to_record(row: &MySqlRow) -> Result<UrlRecord> {
    let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let original_url: String = row.try_get("original_url").map_err(map_sqlx_error)?;
    let expire_at: i64 = row.try_get("expire_at").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(map_sqlx_error)?;

    let code = ShortCode::new(&code)
        .map_err(|e| StorageError::InvalidData(format!("stored short code '{code}': {e}")))?;

    Ok(UrlRecord {
        code,
        original_url,
        expire_at: parse_millis("expire_at", expire_at)?,
        created_at: parse_millis("created_at", created_at)?,
        updated_at: parse_millis("updated_at", updated_at)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM short_urls WHERE short_code = ? LIMIT 1"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn get_active(&self, code: &ShortCode, now: Timestamp) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM short_urls
            WHERE short_code = ?
              AND expire_at > ?
            LIMIT 1
            "#
        ))
        .bind(code.as_str())
        .bind(now.as_millisecond())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }

    async fn find_by_url(
        &self,
        original_url: &str,
        now: Timestamp,
    ) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM short_urls
            WHERE original_url = ?
              AND expire_at > ?
            ORDER BY expire_at DESC, created_at DESC
            LIMIT 1
            "#
        ))
        .bind(original_url)
        .bind(now.as_millisecond())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn list_active(&self, now: Timestamp) -> Result<Vec<UrlRecord>> {
        self.fetch_all(
            &format!(
                r#"
                SELECT {RECORD_COLUMNS}
                FROM short_urls
                WHERE expire_at > ?
                ORDER BY created_at, short_code
                "#
            ),
            now,
        )
        .await
    }

    async fn list_expired(&self, now: Timestamp) -> Result<Vec<UrlRecord>> {
        self.fetch_all(
            &format!(
                r#"
                SELECT {RECORD_COLUMNS}
                FROM short_urls
                WHERE expire_at <= ?
                ORDER BY created_at, short_code
                "#
            ),
            now,
        )
        .await
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert(&self, mut record: NewUrlRecord) -> Result<UrlRecord> {
        // round-trip through the stored precision so the returned record
        // matches what a later read produces
        record.expire_at = parse_millis("expire_at", record.expire_at.as_millisecond())?;
        let now = parse_millis("created_at", Timestamp::now().as_millisecond())?;
        let stored = record.persisted_at(now);

        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_code, original_url, expire_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(stored.code.as_str())
        .bind(stored.original_url.as_str())
        .bind(stored.expire_at.as_millisecond())
        .bind(stored.created_at.as_millisecond())
        .bind(stored.updated_at.as_millisecond())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(stored),
            Err(err) if is_unique_violation(&err) => {
                Err(StorageError::Conflict(stored.code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let result = sqlx::query("DELETE FROM short_urls WHERE short_code = ?")
            .bind(code.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_if_expired(&self, code: &ShortCode, now: Timestamp) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM short_urls
            WHERE short_code = ?
              AND expire_at <= ?
            "#,
        )
        .bind(code.as_str())
        .bind(now.as_millisecond())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64> {
        let result = sqlx::query("DELETE FROM short_urls WHERE expire_at <= ?")
            .bind(now.as_millisecond())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
