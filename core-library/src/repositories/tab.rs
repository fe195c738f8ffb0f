//! Tab repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::{Tab, TabRow};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;

/// Column list for `TabRow`, qualified with the `t` alias.
pub(crate) const TAB_COLUMNS: &str = "t.id, t.title, t.artist, t.album, t.file_path, t.tab_type, \
     t.is_managed, t.cover_path, t.country, t.language, t.tag, t.added_at, t.last_opened";

/// Tab repository interface for data access operations
#[async_trait]
pub trait TabRepository: Send + Sync {
    /// Find a tab by its ID
    ///
    /// # Returns
    /// - `Ok(Some(tab))` if found
    /// - `Ok(None)` if not found
    /// - `Err` if database error occurs
    async fn find_by_id(&self, id: &str) -> Result<Option<Tab>>;

    /// Find the tab tracking exactly this file path
    async fn find_by_path(&self, file_path: &str) -> Result<Option<Tab>>;

    /// Find the earliest-added tab with exactly this title
    async fn find_by_title(&self, title: &str) -> Result<Option<Tab>>;

    /// Insert or replace a tab together with its category associations
    ///
    /// Runs in one transaction: the row is upserted, the association set is
    /// replaced (delete-then-insert) and the legacy primary-category column
    /// is set to the first category. Associations that survive keep their
    /// original stamp; new ones are stamped with the current time.
    ///
    /// # Errors
    /// Returns error if:
    /// - Tab validation fails
    /// - Another live tab already tracks the same file path
    /// - A referenced category does not exist
    async fn upsert(&self, tab: &Tab) -> Result<()>;

    /// Delete a tab by ID; associations cascade
    ///
    /// # Returns
    /// - `Ok(true)` if the tab was deleted
    /// - `Ok(false)` if the tab was not found
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Replace the association set, stamping every association with `timestamp`
    ///
    /// # Errors
    /// Returns `NotFound` if the tab does not exist.
    async fn set_categories(&self, id: &str, category_ids: &[String], timestamp: i64)
        -> Result<()>;

    /// Record (or clear) the cover image of a tab
    async fn set_cover(&self, id: &str, cover_path: Option<&str>) -> Result<bool>;

    /// Bump the "last opened" timestamp
    async fn touch_last_opened(&self, id: &str, timestamp: i64) -> Result<bool>;

    /// True if any tab has exactly this title
    async fn title_exists(&self, title: &str) -> Result<bool>;

    /// Count total tabs
    async fn count(&self) -> Result<i64>;
}

/// SQLite implementation of TabRepository
pub struct SqliteTabRepository {
    pool: SqlitePool,
}

impl SqliteTabRepository {
    /// Create a new SQLite tab repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<Tab>> {
        let sql = format!(
            "SELECT {} FROM tabs t WHERE {} ORDER BY t.added_at ASC, t.rowid ASC LIMIT 1",
            TAB_COLUMNS, filter
        );

        let mut conn = self.pool.acquire().await?;
        let row = query_as::<_, TabRow>(&sql)
            .bind(value)
            .fetch_optional(&mut *conn)
            .await?;

        match row {
            Some(row) => {
                let mut categories = load_category_ids(&mut *conn, &[row.id.clone()]).await?;
                let ids = categories.remove(&row.id).unwrap_or_default();
                Ok(Some(row.into_tab(ids)))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl TabRepository for SqliteTabRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Tab>> {
        self.find_one("t.id = ?", id).await
    }

    async fn find_by_path(&self, file_path: &str) -> Result<Option<Tab>> {
        if file_path.is_empty() {
            return Ok(None);
        }
        self.find_one("t.file_path = ?", file_path).await
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Tab>> {
        self.find_one("t.title = ?", title).await
    }

    async fn upsert(&self, tab: &Tab) -> Result<()> {
        tab.validate()
            .map_err(|msg| LibraryError::invalid("tab", msg))?;

        let mut tx = self.pool.begin().await?;

        query(
            r#"
            INSERT INTO tabs (
                id, title, artist, album, file_path, tab_type, is_managed, cover_path,
                category_id, country, language, tag, added_at, last_opened
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                file_path = excluded.file_path,
                tab_type = excluded.tab_type,
                is_managed = excluded.is_managed,
                cover_path = excluded.cover_path,
                category_id = excluded.category_id,
                country = excluded.country,
                language = excluded.language,
                tag = excluded.tag,
                added_at = excluded.added_at,
                last_opened = excluded.last_opened
            "#,
        )
        .bind(&tab.id)
        .bind(&tab.title)
        .bind(&tab.artist)
        .bind(&tab.album)
        .bind(&tab.file_path)
        .bind(tab.tab_type.as_str())
        .bind(tab.is_managed)
        .bind(&tab.cover_path)
        .bind(tab.primary_category())
        .bind(&tab.country)
        .bind(&tab.language)
        .bind(&tab.tag)
        .bind(tab.added_at)
        .bind(tab.last_opened)
        .execute(&mut *tx)
        .await?;

        let existing: HashMap<String, i64> =
            query_as::<_, (String, i64)>("SELECT category_id, added_at FROM tab_categories WHERE tab_id = ?")
                .bind(&tab.id)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .collect();

        let now = Utc::now().timestamp();
        let associations: Vec<(String, i64)> = tab
            .category_ids
            .iter()
            .map(|category_id| {
                let stamp = existing.get(category_id).copied().unwrap_or(now);
                (category_id.clone(), stamp)
            })
            .collect();

        replace_associations(&mut *tx, &tab.id, &associations).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = query("DELETE FROM tabs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_categories(
        &self,
        id: &str,
        category_ids: &[String],
        timestamp: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists = query_as::<_, (i64,)>("SELECT COUNT(*) FROM tabs WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?
            .0
            > 0;
        if !exists {
            return Err(LibraryError::not_found("tab", id));
        }

        let mut associations: Vec<(String, i64)> = Vec::with_capacity(category_ids.len());
        for category_id in category_ids {
            if category_id.is_empty() {
                return Err(LibraryError::invalid("category_ids", "empty category id"));
            }
            if !associations.iter().any(|(existing, _)| existing == category_id) {
                associations.push((category_id.clone(), timestamp));
            }
        }

        replace_associations(&mut *tx, id, &associations).await?;
        query("UPDATE tabs SET category_id = ? WHERE id = ?")
            .bind(associations.first().map(|(category_id, _)| category_id.as_str()))
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn set_cover(&self, id: &str, cover_path: Option<&str>) -> Result<bool> {
        let result = query("UPDATE tabs SET cover_path = ? WHERE id = ?")
            .bind(cover_path)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_opened(&self, id: &str, timestamp: i64) -> Result<bool> {
        let result = query("UPDATE tabs SET last_opened = ? WHERE id = ?")
            .bind(timestamp)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn title_exists(&self, title: &str) -> Result<bool> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM tabs WHERE title = ?")
            .bind(title)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0 > 0)
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = query_as("SELECT COUNT(*) FROM tabs")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}

/// Delete-then-insert the association set of one tab.
async fn replace_associations(
    conn: &mut SqliteConnection,
    tab_id: &str,
    associations: &[(String, i64)],
) -> Result<()> {
    query("DELETE FROM tab_categories WHERE tab_id = ?")
        .bind(tab_id)
        .execute(&mut *conn)
        .await?;

    for (category_id, added_at) in associations {
        query("INSERT INTO tab_categories (tab_id, category_id, added_at) VALUES (?, ?, ?)")
            .bind(tab_id)
            .bind(category_id)
            .bind(added_at)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}

/// Load association sets for the given tabs, each in assignment order.
pub(crate) async fn load_category_ids(
    conn: &mut SqliteConnection,
    tab_ids: &[String],
) -> Result<HashMap<String, Vec<String>>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    if tab_ids.is_empty() {
        return Ok(map);
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT tab_id, category_id FROM tab_categories WHERE tab_id IN (");
    let mut separated = builder.separated(", ");
    for id in tab_ids {
        separated.push_bind(id.clone());
    }
    separated.push_unseparated(") ORDER BY rowid ASC");

    let rows = builder
        .build_query_as::<(String, String)>()
        .fetch_all(&mut *conn)
        .await?;

    for (tab_id, category_id) in rows {
        map.entry(tab_id).or_default().push(category_id);
    }

    Ok(map)
}

/// Attach association sets to rows, preserving row order.
pub(crate) async fn hydrate_tabs(conn: &mut SqliteConnection, rows: Vec<TabRow>) -> Result<Vec<Tab>> {
    let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
    let mut categories = load_category_ids(conn, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let ids = categories.remove(&row.id).unwrap_or_default();
            row.into_tab(ids)
        })
        .collect())
}
