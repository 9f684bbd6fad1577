mod import;
mod models;
mod schema;
mod store;
mod trait_def;
pub mod validation;

pub use import::{import_songs_csv, ImportError, ImportReport};
pub use models::*;
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogStore;
