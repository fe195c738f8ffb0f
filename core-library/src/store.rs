//! # Entity Store
//!
//! [`EntityStore`] is the single entry point for durable library state:
//! tabs, categories and settings.
//!
//! ## Concurrency
//!
//! The store is shared as `Arc<EntityStore>` between the sync walk, cover
//! workers and the host, and **must stay safe to call from any task or
//! thread**. Every operation runs inside one exclusive async critical
//! section, so operations never interleave. Transactions make each write
//! atomic; a failed write leaves no partial state behind.
//!
//! ## Settings
//!
//! Settings are loaded into an owned cache on initialization. Reads return a
//! clone of the cache; writes go to the settings table first, then the cache
//! is reloaded from it.

use crate::db::{create_pool, DatabaseConfig};
use crate::error::{LibraryError, Result};
use crate::models::{Category, Settings, Tab};
use crate::repositories::{
    CategoryRepository, Page, SettingsRepository, SqliteCategoryRepository,
    SqliteSettingsRepository, SqliteTabRepository, TabRepository,
};
use crate::search::{FallbackSearch, SearchStrategy, TabQuery};
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::SqlitePool;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Transactional storage for the tab catalog.
pub struct EntityStore {
    pool: SqlitePool,
    tabs: Box<dyn TabRepository>,
    categories: Box<dyn CategoryRepository>,
    settings_repo: Box<dyn SettingsRepository>,
    search: Box<dyn SearchStrategy>,
    gate: Mutex<()>,
    settings: RwLock<Settings>,
}

impl EntityStore {
    /// Open (or create) the database, run migrations and load settings.
    ///
    /// Any failure here is fatal to startup.
    pub async fn initialize(config: DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Self::from_pool(pool).await
    }

    /// Store over a private in-memory database.
    pub async fn open_in_memory() -> Result<Self> {
        Self::initialize(DatabaseConfig::in_memory()).await
    }

    /// Wrap an already migrated pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let settings_repo = SqliteSettingsRepository::new(pool.clone());
        let settings = settings_repo.load().await?;

        info!(
            sync_paths = settings.sync_paths.len(),
            strategy = settings.sync_strategy.as_str(),
            "Entity store initialized"
        );

        Ok(Self {
            tabs: Box::new(SqliteTabRepository::new(pool.clone())),
            categories: Box::new(SqliteCategoryRepository::new(pool.clone())),
            settings_repo: Box::new(settings_repo),
            search: Box::new(FallbackSearch::default()),
            gate: Mutex::new(()),
            settings: RwLock::new(settings),
            pool,
        })
    }

    /// Replace the listing strategy.
    pub fn with_search_strategy(mut self, search: Box<dyn SearchStrategy>) -> Self {
        self.search = search;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        let _guard = self.gate.lock().await;
        self.pool.close().await;
    }

    // -------------------------------------------------------------------------
    // Tabs
    // -------------------------------------------------------------------------

    pub async fn get_tab(&self, id: &str) -> Result<Option<Tab>> {
        let _guard = self.gate.lock().await;
        self.tabs.find_by_id(id).await
    }

    /// Live entry tracking exactly `file_path`.
    pub async fn get_tab_by_path(&self, file_path: &str) -> Result<Option<Tab>> {
        let _guard = self.gate.lock().await;
        self.tabs.find_by_path(file_path).await
    }

    /// Earliest entry with exactly `title`.
    pub async fn get_tab_by_title(&self, title: &str) -> Result<Option<Tab>> {
        let _guard = self.gate.lock().await;
        self.tabs.find_by_title(title).await
    }

    pub async fn title_exists(&self, title: &str) -> Result<bool> {
        let _guard = self.gate.lock().await;
        self.tabs.title_exists(title).await
    }

    /// Insert or replace a tab together with its category associations.
    ///
    /// Fails with `InvalidInput` if another live entry already tracks the
    /// same file path.
    #[instrument(skip(self, tab), fields(tab_id = %tab.id))]
    pub async fn add_tab(&self, tab: &Tab) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.upsert_tab(tab).await
    }

    /// Same atomic upsert as [`EntityStore::add_tab`].
    #[instrument(skip(self, tab), fields(tab_id = %tab.id))]
    pub async fn update_tab(&self, tab: &Tab) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.upsert_tab(tab).await
    }

    async fn upsert_tab(&self, tab: &Tab) -> Result<()> {
        if !tab.file_path.is_empty() {
            if let Some(existing) = self.tabs.find_by_path(&tab.file_path).await? {
                if existing.id != tab.id {
                    return Err(LibraryError::invalid(
                        "file_path",
                        format!("{} is already tracked by {}", tab.file_path, existing.id),
                    ));
                }
            }
        }

        self.tabs.upsert(tab).await?;
        debug!(title = %tab.title, "Tab saved");
        Ok(())
    }

    /// Delete a tab and its category associations.
    ///
    /// For managed tabs the underlying file and cover image are removed too;
    /// failures there are logged, the row is gone either way. Returns `false`
    /// if no such tab existed.
    #[instrument(skip(self))]
    pub async fn delete_tab(&self, id: &str) -> Result<bool> {
        let _guard = self.gate.lock().await;

        let Some(tab) = self.tabs.find_by_id(id).await? else {
            return Ok(false);
        };

        let deleted = self.tabs.delete(id).await?;

        if deleted && tab.is_managed {
            remove_owned_file(&tab.file_path).await;
            if let Some(cover) = tab.cover_path.as_deref() {
                remove_owned_file(cover).await;
            }
        }

        Ok(deleted)
    }

    /// Replace the association set, stamping each with `timestamp`.
    #[instrument(skip(self, category_ids))]
    pub async fn set_tab_categories(
        &self,
        id: &str,
        category_ids: &[String],
        timestamp: i64,
    ) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.tabs.set_categories(id, category_ids, timestamp).await
    }

    /// Record a cover path and return the updated tab.
    #[instrument(skip(self))]
    pub async fn set_tab_cover(&self, id: &str, cover_path: Option<&str>) -> Result<Tab> {
        let _guard = self.gate.lock().await;

        if !self.tabs.set_cover(id, cover_path).await? {
            return Err(LibraryError::not_found("tab", id));
        }

        self.tabs
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::not_found("tab", id))
    }

    pub async fn touch_last_opened(&self, id: &str, timestamp: i64) -> Result<()> {
        let _guard = self.gate.lock().await;

        if self.tabs.touch_last_opened(id, timestamp).await? {
            Ok(())
        } else {
            Err(LibraryError::not_found("tab", id))
        }
    }

    /// One page of tabs matching `query`.
    ///
    /// A search the full-text index rejects is transparently retried as a
    /// substring scan.
    pub async fn get_tabs_paginated(&self, query: &TabQuery) -> Result<Page<Tab>> {
        let _guard = self.gate.lock().await;
        self.search.search(&self.pool, query).await
    }

    pub async fn tab_count(&self) -> Result<i64> {
        let _guard = self.gate.lock().await;
        self.tabs.count().await
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    /// Create a category with a generated id.
    pub async fn create_category(&self, name: &str, parent_id: Option<&str>) -> Result<Category> {
        let category = Category::new(
            name.trim(),
            parent_id.map(str::to_string),
            Utc::now().timestamp(),
        );

        let _guard = self.gate.lock().await;
        self.categories.insert(&category).await?;
        self.categories
            .find_by_id(&category.id)
            .await?
            .ok_or_else(|| LibraryError::not_found("category", &category.id))
    }

    pub async fn add_category(&self, category: &Category) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.categories.insert(category).await
    }

    pub async fn get_category(&self, id: &str) -> Result<Option<Category>> {
        let _guard = self.gate.lock().await;
        self.categories.find_by_id(id).await
    }

    /// All categories with their effective covers, by name.
    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        let _guard = self.gate.lock().await;
        self.categories.find_all().await
    }

    /// Direct children of `parent_id`, or the roots for `None`.
    pub async fn child_categories(&self, parent_id: Option<&str>) -> Result<Vec<Category>> {
        let _guard = self.gate.lock().await;
        self.categories.find_children(parent_id).await
    }

    pub async fn rename_category(&self, id: &str, name: &str) -> Result<()> {
        let _guard = self.gate.lock().await;

        if self.categories.rename(id, name.trim()).await? {
            Ok(())
        } else {
            Err(LibraryError::not_found("category", id))
        }
    }

    pub async fn set_category_cover(&self, id: &str, cover_path: Option<&str>) -> Result<()> {
        let _guard = self.gate.lock().await;

        if self.categories.set_cover(id, cover_path).await? {
            Ok(())
        } else {
            Err(LibraryError::not_found("category", id))
        }
    }

    /// Re-parent a category; moving it under itself or a descendant fails.
    #[instrument(skip(self))]
    pub async fn move_category(&self, id: &str, new_parent_id: Option<&str>) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.categories.move_to(id, new_parent_id).await
    }

    /// Delete a category. Children become roots; tabs are kept.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: &str) -> Result<bool> {
        let _guard = self.gate.lock().await;
        self.categories.delete(id).await
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Snapshot of the cached settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    /// Persist the full settings set atomically and refresh the cache.
    #[instrument(skip(self, settings))]
    pub async fn update_settings(&self, settings: &Settings) -> Result<()> {
        let _guard = self.gate.lock().await;
        self.settings_repo.save(settings).await?;
        self.reload_settings().await
    }

    pub async fn set_last_sync_time(&self, timestamp: i64) -> Result<()> {
        let _guard = self.gate.lock().await;
        let mut settings = self.settings.read().clone();
        settings.last_sync_time = Some(timestamp);
        self.settings_repo.save(&settings).await?;
        self.reload_settings().await
    }

    async fn reload_settings(&self) -> Result<()> {
        let fresh = self.settings_repo.load().await?;
        *self.settings.write() = fresh;
        Ok(())
    }
}

async fn remove_owned_file(path: &str) {
    if path.is_empty() {
        return;
    }

    match tokio::fs::remove_file(Path::new(path)).await {
        Ok(()) => debug!(path, "Removed managed file"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!(path, error = %err, "Failed to remove managed file"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_settings_cache_follows_writes() {
        let store = EntityStore::open_in_memory().await.unwrap();
        assert_eq!(store.settings(), Settings::default());

        store.set_last_sync_time(1_700_000_000).await.unwrap();
        assert_eq!(store.settings().last_sync_time, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_missing_entities() {
        let store = EntityStore::open_in_memory().await.unwrap();

        assert!(store.get_tab("nope").await.unwrap().is_none());
        assert!(!store.delete_tab("nope").await.unwrap());
        assert!(store
            .touch_last_opened("nope", 1)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .set_tab_cover("nope", Some("/c.jpg"))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(store
            .rename_category("nope", "x")
            .await
            .unwrap_err()
            .is_not_found());
    }
}
