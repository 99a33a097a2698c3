//! URL shortener service implementation.
//!
//! This crate provides the [`ShortenerService`] that allocates short codes,
//! resolves them with lazy expiry, and the [`Sweeper`] that reclaims expired
//! records in the background. Core types are re-exported from `lapse_core`.

pub mod service;
pub mod sweeper;

pub use lapse_core::{Expiration, ShortCode, ShortenParams, Shortener, ShortenerError, UrlRecord};
pub use service::{ShortenerService, ShortenerSettings};
pub use sweeper::{Sweeper, SweeperSettings};
