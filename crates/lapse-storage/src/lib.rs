//! Storage backends for the Lapse repository contract.

pub mod memory;
pub mod mysql;

pub use lapse_core::error::StorageError;
pub use lapse_core::repository::{NewUrlRecord, ReadRepository, Repository, UrlRecord};
pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;
