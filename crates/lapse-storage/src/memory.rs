use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use lapse_core::error::{Result, StorageError};
use lapse_core::repository::{NewUrlRecord, ReadRepository, Repository, UrlRecord};
use lapse_core::{Clock, ShortCode, SystemClock};

/// In-memory implementation of the Repository trait using DashMap.
///
/// Inserts go through the entry API, so the uniqueness check and the write
/// happen under the same shard lock.
///
/// The clock only stamps `created_at` / `updated_at`; expiry decisions use
/// the `now` handed in by the caller.
#[derive(Debug, Clone)]
pub struct InMemoryRepository<C = SystemClock> {
    storage: DashMap<ShortCode, UrlRecord>,
    clock: C,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> InMemoryRepository<C> {
    /// Creates a repository that stamps records with `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            storage: DashMap::new(),
            clock,
        }
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    fn collect_sorted(&self, keep: impl Fn(&UrlRecord) -> bool) -> Vec<UrlRecord> {
        let mut records: Vec<UrlRecord> = self
            .storage
            .iter()
            .filter(|entry| keep(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });
        records
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: Clock> ReadRepository for InMemoryRepository<C> {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.storage.get(code).map(|entry| entry.value().clone()))
    }

    async fn get_active(&self, code: &ShortCode, now: Timestamp) -> Result<Option<UrlRecord>> {
        Ok(self
            .storage
            .get(code)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value().clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.contains_key(code))
    }

    async fn find_by_url(
        &self,
        original_url: &str,
        now: Timestamp,
    ) -> Result<Option<UrlRecord>> {
        Ok(self
            .storage
            .iter()
            .filter(|entry| entry.original_url == original_url && !entry.is_expired_at(now))
            .max_by(|a, b| {
                a.expire_at
                    .cmp(&b.expire_at)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            })
            .map(|entry| entry.value().clone()))
    }

    async fn list_active(&self, now: Timestamp) -> Result<Vec<UrlRecord>> {
        Ok(self.collect_sorted(|record| !record.is_expired_at(now)))
    }

    async fn list_expired(&self, now: Timestamp) -> Result<Vec<UrlRecord>> {
        Ok(self.collect_sorted(|record| record.is_expired_at(now)))
    }
}

#[async_trait]
impl<C: Clock> Repository for InMemoryRepository<C> {
    async fn insert(&self, record: NewUrlRecord) -> Result<UrlRecord> {
        match self.storage.entry(record.code.clone()) {
            Entry::Occupied(existing) => Err(StorageError::Conflict(existing.key().to_string())),
            Entry::Vacant(slot) => {
                let stored = record.persisted_at(self.clock.now());
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.remove(code).is_some())
    }

    async fn delete_if_expired(&self, code: &ShortCode, now: Timestamp) -> Result<bool> {
        Ok(self
            .storage
            .remove_if(code, |_, record| record.is_expired_at(now))
            .is_some())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64> {
        let mut removed = 0_u64;
        self.storage.retain(|_, record| {
            let expired = record.is_expired_at(now);
            if expired {
                removed += 1;
            }
            !expired
        });
        Ok(removed)
    }
}
