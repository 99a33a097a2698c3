//! Core types and traits for the Lapse expiring-link shortener.
//!
//! This crate provides the types shared by the storage backends, the code
//! generators and the shortener service: the [`ShortCode`] identifier, the
//! stored [`UrlRecord`], the expiry predicate and the repository contract.

pub mod clock;
pub mod error;
pub mod expiry;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, ShortenerError, StorageError};
pub use expiry::{is_expired, Expiration};
pub use repository::{NewUrlRecord, ReadRepository, Repository, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{ShortenParams, Shortener};
