//! Category repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::Category;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use std::collections::HashSet;

/// Category columns plus the derived effective cover.
///
/// The effective cover is the explicit override if set, otherwise the cover of
/// the earliest-associated tab that has one.
const CATEGORY_SELECT: &str = r#"
    SELECT
        c.id,
        c.name,
        c.parent_id,
        c.cover_path,
        COALESCE(
            NULLIF(c.cover_path, ''),
            (
                SELECT t.cover_path
                FROM tab_categories tc
                INNER JOIN tabs t ON t.id = tc.tab_id
                WHERE tc.category_id = c.id
                  AND t.cover_path IS NOT NULL
                  AND t.cover_path <> ''
                ORDER BY tc.added_at ASC, tc.rowid ASC
                LIMIT 1
            )
        ) AS effective_cover_path,
        c.created_at
    FROM categories c
"#;

/// Category repository interface
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Find a category by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Category>>;

    /// All categories ordered by name
    async fn find_all(&self) -> Result<Vec<Category>>;

    /// Direct children of `parent_id` (`None` for roots)
    async fn find_children(&self, parent_id: Option<&str>) -> Result<Vec<Category>>;

    /// Insert a new category
    ///
    /// # Errors
    /// Returns error if the id is taken, validation fails or the parent
    /// does not exist.
    async fn insert(&self, category: &Category) -> Result<()>;

    /// Rename a category; returns false if it does not exist
    async fn rename(&self, id: &str, name: &str) -> Result<bool>;

    /// Set or clear the explicit cover override
    async fn set_cover(&self, id: &str, cover_path: Option<&str>) -> Result<bool>;

    /// Re-parent a category
    ///
    /// # Errors
    /// - `NotFound` if the category or the new parent does not exist
    /// - `InvalidInput` if the move would create a cycle
    async fn move_to(&self, id: &str, new_parent_id: Option<&str>) -> Result<()>;

    /// Delete a category
    ///
    /// Children are promoted to root, associations cascade, and the legacy
    /// primary-category column of affected tabs is recomputed. Tabs are
    /// never deleted.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// SQLite implementation of CategoryRepository
pub struct SqliteCategoryRepository {
    pool: SqlitePool,
}

impl SqliteCategoryRepository {
    /// Create a new SQLite category repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Category>> {
        let sql = format!("{} WHERE c.id = ?", CATEGORY_SELECT);
        let category = query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(category)
    }

    async fn find_all(&self) -> Result<Vec<Category>> {
        let sql = format!("{} ORDER BY c.name COLLATE NOCASE ASC, c.id ASC", CATEGORY_SELECT);
        let categories = query_as::<_, Category>(&sql).fetch_all(&self.pool).await?;

        Ok(categories)
    }

    async fn find_children(&self, parent_id: Option<&str>) -> Result<Vec<Category>> {
        let sql = format!(
            "{} WHERE c.parent_id IS ? ORDER BY c.name COLLATE NOCASE ASC, c.id ASC",
            CATEGORY_SELECT
        );
        let categories = query_as::<_, Category>(&sql)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    async fn insert(&self, category: &Category) -> Result<()> {
        category
            .validate()
            .map_err(|msg| LibraryError::invalid("category", msg))?;

        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = category.parent_id.as_deref() {
            let parent: Option<(String,)> = query_as("SELECT id FROM categories WHERE id = ?")
                .bind(parent_id)
                .fetch_optional(&mut *tx)
                .await?;
            if parent.is_none() {
                return Err(LibraryError::not_found("category", parent_id));
            }
        }

        query(
            r#"
            INSERT INTO categories (id, name, parent_id, cover_path, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.parent_id)
        .bind(&category.cover_path)
        .bind(category.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn rename(&self, id: &str, name: &str) -> Result<bool> {
        if name.trim().is_empty() {
            return Err(LibraryError::invalid("name", "Category name cannot be empty"));
        }

        let result = query("UPDATE categories SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_cover(&self, id: &str, cover_path: Option<&str>) -> Result<bool> {
        let result = query("UPDATE categories SET cover_path = ? WHERE id = ?")
            .bind(cover_path)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn move_to(&self, id: &str, new_parent_id: Option<&str>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<(String,)> = query_as("SELECT id FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(LibraryError::not_found("category", id));
        }

        if let Some(parent_id) = new_parent_id {
            // Walk up from the new parent; meeting `id` means a cycle.
            let mut cursor = Some(parent_id.to_string());
            let mut visited = HashSet::new();
            let mut first = true;
            while let Some(current) = cursor {
                if current == id {
                    return Err(LibraryError::invalid(
                        "parent_id",
                        format!("moving {} under {} would create a cycle", id, parent_id),
                    ));
                }

                let row: Option<(Option<String>,)> =
                    query_as("SELECT parent_id FROM categories WHERE id = ?")
                        .bind(&current)
                        .fetch_optional(&mut *tx)
                        .await?;
                visited.insert(current);

                match row {
                    // A pre-existing loop above the new parent cannot contain `id`.
                    Some((Some(parent),)) if visited.contains(&parent) => cursor = None,
                    Some((parent,)) => cursor = parent,
                    None if first => return Err(LibraryError::not_found("category", parent_id)),
                    // Dangling parent reference higher up; treat as root.
                    None => cursor = None,
                }
                first = false;
            }
        }

        query("UPDATE categories SET parent_id = ? WHERE id = ?")
            .bind(new_parent_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        query("UPDATE categories SET parent_id = NULL WHERE parent_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        query(
            r#"
            UPDATE tabs SET category_id = (
                SELECT tc.category_id FROM tab_categories tc
                WHERE tc.tab_id = tabs.id
                ORDER BY tc.rowid ASC
                LIMIT 1
            )
            WHERE category_id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
