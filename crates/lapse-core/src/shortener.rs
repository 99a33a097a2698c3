use crate::expiry::Expiration;
use crate::repository::UrlRecord;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone)]
pub struct ShortenParams {
    /// The original URL to be shortened.
    pub original_url: String,
    /// When the shortened URL expires; `None` applies the service default.
    pub expiration: Option<Expiration>,
}

impl ShortenParams {
    pub fn new(original_url: impl Into<String>) -> Self {
        Self {
            original_url: original_url.into(),
            expiration: None,
        }
    }

    pub fn with_expiration(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }
}

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Shortens a URL and returns the stored record.
    ///
    /// If an unexpired record for the same URL exists it is returned as is.
    async fn shorten(&self, params: ShortenParams) -> Result<UrlRecord>;

    /// Resolves a short code to its original URL.
    /// Returns `None` if the code does not exist or has expired.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Lists every unexpired record.
    async fn list_active(&self) -> Result<Vec<UrlRecord>>;

    /// Deletes every record expired at `now` (the current time if `None`)
    /// and returns how many were removed.
    async fn cleanup(&self, now: Option<Timestamp>) -> Result<u64>;
}
