//! Infrastructure layer: configuration, Postgres and in-memory persistence,
//! and the inventory services built on top of them.

pub mod config;
pub mod db;
pub mod error;
pub mod repository;
pub mod services;

pub use config::{AppConfig, ConfigError};
pub use error::{InventoryError, InventoryResult};
pub use repository::{InMemoryDatabase, Page, PageRequest, PgDatabase};
pub use services::InventoryServices;
