//! Settings repository: a flat key/value table

use crate::error::Result;
use crate::models::Settings;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use std::collections::HashMap;

/// Settings persistence interface
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load the persisted settings (defaults for anything missing)
    async fn load(&self) -> Result<Settings>;

    /// Replace the whole settings table in one transaction
    async fn save(&self, settings: &Settings) -> Result<()>;
}

/// SQLite implementation of SettingsRepository
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn load(&self) -> Result<Settings> {
        let rows: Vec<(String, String)> = query_as("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await?;

        let pairs: HashMap<String, String> = rows.into_iter().collect();
        Ok(Settings::from_pairs(&pairs))
    }

    async fn save(&self, settings: &Settings) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        query("DELETE FROM settings").execute(&mut *tx).await?;

        for (key, value) in settings.to_pairs() {
            query("INSERT INTO settings (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
