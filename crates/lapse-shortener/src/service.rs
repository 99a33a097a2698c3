use async_trait::async_trait;
use jiff::{SignedDuration, Timestamp};
use lapse_core::expiry::DEFAULT_TTL;
use lapse_core::{
    Clock, Expiration, NewUrlRecord, Repository, ShortCode, ShortenParams, Shortener,
    ShortenerError, StorageError, SystemClock, UrlRecord,
};
use lapse_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, trace};
use typed_builder::TypedBuilder;
use url::Url;

type Result<T> = std::result::Result<T, ShortenerError>;

/// Schemes a target URL may use.
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "ftp", "file"];

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1_000;

/// Tunables for [`ShortenerService`].
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct ShortenerSettings {
    /// Lifetime applied when a request carries no expiration.
    #[builder(default = DEFAULT_TTL)]
    pub default_ttl: SignedDuration,
    /// Upper bound on candidate codes tried per `shorten` call, counting both
    /// existence-check collisions and insert conflicts.
    #[builder(default = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository`, a `Generator` and a `Clock` to handle:
/// - URL validation and deduplication against unexpired records
/// - Short code allocation with a bounded collision retry
/// - Lazy deletion of expired records on resolve
/// - Bulk cleanup of expired records
///
/// The generator does not need to guarantee uniqueness. Every candidate is
/// checked against the repository, and the repository's own conflict error
/// is retried as well.
#[derive(Debug)]
pub struct ShortenerService<R, G, C = SystemClock> {
    repository: Arc<R>,
    generator: Arc<G>,
    clock: C,
    settings: ShortenerSettings,
}

impl<R, G, C: Clone> Clone for ShortenerService<R, G, C> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            clock: self.clock.clone(),
            settings: self.settings,
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    /// Creates a new `ShortenerService` on the system clock with default settings.
    pub fn new(repository: R, generator: G) -> Self {
        Self {
            repository: Arc::new(repository),
            generator: Arc::new(generator),
            clock: SystemClock,
            settings: ShortenerSettings::default(),
        }
    }
}

impl<R: Repository, G: Generator, C: Clock> ShortenerService<R, G, C> {
    pub fn with_settings(mut self, settings: ShortenerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the clock used for every expiry decision.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> ShortenerService<R, G, C2> {
        ShortenerService {
            repository: self.repository,
            generator: self.generator,
            clock,
            settings: self.settings,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Resolves a code given as raw text.
    ///
    /// Text that is not a well-formed short code can never have been issued,
    /// so it resolves to `None` rather than an error.
    pub async fn resolve_str(&self, code: &str) -> Result<Option<String>> {
        match code.parse::<ShortCode>() {
            Ok(code) => self.resolve(&code).await,
            Err(err) => {
                trace!(code, error = %err, "rejecting malformed short code");
                Ok(None)
            }
        }
    }

    /// Returns the stored record for `code` whether or not it has expired.
    /// Has no side effects.
    pub async fn lookup(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.repository.get(code).await?)
    }

    /// Lists the expired records still waiting for a sweep.
    pub async fn list_expired(&self) -> Result<Vec<UrlRecord>> {
        Ok(self.repository.list_expired(self.clock.now()).await?)
    }

    /// Validates that the URL is absolute and uses a supported scheme.
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl(
                "URL cannot be empty".to_string(),
            ));
        }

        let parsed = Url::parse(url)
            .map_err(|e| ShortenerError::InvalidUrl(format!("{url}: {e}")))?;

        if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
            return Err(ShortenerError::InvalidUrl(format!(
                "unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        Ok(())
    }

    /// Draws candidates until one is not taken by any stored record.
    ///
    /// `attempts` is shared with the caller so that insert conflicts and
    /// collisions draw from the same budget.
    async fn allocate(&self, attempts: &mut u32) -> Result<ShortCode> {
        while *attempts < self.settings.max_attempts {
            *attempts += 1;
            let candidate: ShortCode = self.generator.generate().into();

            if !self.repository.exists(&candidate).await? {
                return Ok(candidate);
            }
            debug!(code = %candidate, attempt = *attempts, "short code collision");
        }

        Err(ShortenerError::Exhausted {
            attempts: *attempts,
        })
    }
}

#[async_trait]
impl<R: Repository, G: Generator, C: Clock> Shortener for ShortenerService<R, G, C> {
    async fn shorten(&self, params: ShortenParams) -> Result<UrlRecord> {
        Self::validate_url(&params.original_url)?;

        let now = self.clock.now();
        let expire_at = params
            .expiration
            .unwrap_or(Expiration::AfterDuration(self.settings.default_ttl))
            .expire_at(now)?;

        if let Some(existing) = self
            .repository
            .find_by_url(&params.original_url, now)
            .await?
        {
            debug!(code = %existing.code, url = %existing.original_url, "reusing active short code");
            return Ok(existing);
        }

        let mut attempts = 0;
        loop {
            let code = self.allocate(&mut attempts).await?;
            let record = NewUrlRecord {
                code,
                original_url: params.original_url.clone(),
                expire_at,
            };

            match self.repository.insert(record).await {
                Ok(stored) => {
                    info!(
                        code = %stored.code,
                        url = %stored.original_url,
                        expire_at = %stored.expire_at,
                        "created short code"
                    );
                    return Ok(stored);
                }
                // lost a race against a concurrent insert of the same code
                Err(StorageError::Conflict(code)) => {
                    debug!(code = %code, attempt = attempts, "short code taken during insert");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn resolve(&self, code: &ShortCode) -> Result<Option<String>> {
        trace!(code = %code, "resolving short code");

        let Some(record) = self.repository.get(code).await? else {
            trace!(code = %code, "short code not found");
            return Ok(None);
        };

        let now = self.clock.now();
        if record.is_expired_at(now) {
            let removed = self.repository.delete_if_expired(code, now).await?;
            debug!(code = %code, removed, "short code expired");
            return Ok(None);
        }

        debug!(code = %code, url = %record.original_url, "resolved short code");
        Ok(Some(record.original_url))
    }

    async fn list_active(&self) -> Result<Vec<UrlRecord>> {
        Ok(self.repository.list_active(self.clock.now()).await?)
    }

    async fn cleanup(&self, now: Option<Timestamp>) -> Result<u64> {
        let now = now.unwrap_or_else(|| self.clock.now());
        let removed = self.repository.delete_expired(now).await?;
        info!(removed, now = %now, "cleaned up expired short codes");
        Ok(removed)
    }
}
