//! # Tab Library Store
//!
//! Owns the catalog database: tabs, the category tree and persisted settings.
//!
//! ## Overview
//!
//! - SQLite schema and embedded migrations ([`db`])
//! - Repository traits with SQLite implementations ([`repositories`])
//! - Paginated listing with full-text search and substring fallback ([`search`])
//! - [`EntityStore`], the thread-safe façade everything else goes through

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod search;
pub mod store;

pub use db::{create_pool, create_test_pool, DatabaseConfig};
pub use error::{LibraryError, Result};
pub use models::{
    new_id, AutoSyncFrequency, Category, Settings, SyncStrategy, Tab, TabType,
};
pub use repositories::{Page, PageRequest};
pub use search::{
    FallbackSearch, FullTextSearch, SearchField, SearchStrategy, SubstringSearch, TabQuery,
    TabSortKey,
};
pub use store::EntityStore;
