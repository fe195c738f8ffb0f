//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for the catalog tables.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - Multi-statement writes run inside a single transaction
//! - Pagination is supported via the `Page<T>` wrapper
//!
//! ## Available Repositories
//!
//! - `TabRepository` - Catalog entries and their category associations
//! - `CategoryRepository` - Category tree with derived covers
//! - `SettingsRepository` - Flat key/value preferences

pub mod category;
pub mod pagination;
pub mod settings;
pub mod tab;

pub use category::{CategoryRepository, SqliteCategoryRepository};
pub use pagination::{Page, PageRequest};
pub use settings::{SettingsRepository, SqliteSettingsRepository};
pub use tab::{SqliteTabRepository, TabRepository};
