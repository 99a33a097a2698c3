use crate::error::Result;
use crate::expiry::is_expired;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A stored URL record in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The short code the record is stored under.
    pub code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// When the record expires.
    pub expire_at: Timestamp,
    /// When the store first persisted the record.
    pub created_at: Timestamp,
    /// When the store last wrote the record.
    pub updated_at: Timestamp,
}

impl UrlRecord {
    /// Returns whether the record is expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        is_expired(self.expire_at, now)
    }
}

/// A record about to be inserted; the store assigns the timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrlRecord {
    pub code: ShortCode,
    pub original_url: String,
    pub expire_at: Timestamp,
}

impl NewUrlRecord {
    /// Stamps the record with `now` as both its creation and update time.
    pub fn persisted_at(self, now: Timestamp) -> UrlRecord {
        UrlRecord {
            code: self.code,
            original_url: self.original_url,
            expire_at: self.expire_at,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A read-only view of a repository.
///
/// This trait provides only the read operations from [`Repository`].
/// Nothing here filters by expiry unless it takes a `now` argument.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the URL record for a given short code, expired or not.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Retrieves the URL record for a given short code if it is not expired at `now`.
    async fn get_active(&self, code: &ShortCode, now: Timestamp) -> Result<Option<UrlRecord>>;

    /// Checks whether a short code is taken, including by an expired record.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;

    /// Finds a record for `original_url` that is not expired at `now`.
    ///
    /// When several match, the one expiring last is returned.
    async fn find_by_url(&self, original_url: &str, now: Timestamp)
        -> Result<Option<UrlRecord>>;

    /// Lists every record not expired at `now`, oldest first.
    async fn list_active(&self, now: Timestamp) -> Result<Vec<UrlRecord>>;

    /// Lists every record expired at `now`, oldest first.
    async fn list_expired(&self, now: Timestamp) -> Result<Vec<UrlRecord>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new URL record and returns it with its timestamps set.
    /// Returns `Err(Conflict)` if the code already exists, even if expired.
    async fn insert(&self, record: NewUrlRecord) -> Result<UrlRecord>;

    /// Deletes the URL record for a given short code.
    /// Returns `true` if the record existed and was removed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;

    /// Deletes the record for `code` only if it is expired at `now`.
    /// Returns `true` if a record was removed.
    async fn delete_if_expired(&self, code: &ShortCode, now: Timestamp) -> Result<bool>;

    /// Deletes every record expired at `now` and returns how many were removed.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64>;
}
