//! Song review and ranking server library.
//!
//! Exposes the internal modules so integration tests can build the app directly.

pub mod catalog_store;
pub mod config;
pub mod server;
pub mod sqlite_persistence;
pub mod stats;
pub mod user;

pub use catalog_store::{CatalogStore, SqliteCatalogStore};
pub use server::{run_server, RequestsLoggingLevel};
pub use user::{SqliteUserStore, UserManager, UserRole, UserStore};
