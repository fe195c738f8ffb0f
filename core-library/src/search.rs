//! # Tab Listing and Search
//!
//! Paginated listing of tabs with optional category scoping, sorting and
//! text search.
//!
//! Search is a two-step strategy chain:
//!
//! 1. [`FullTextSearch`] queries the `tabs_fts` index with a prefix match per
//!    requested field, ranked by relevance.
//! 2. If the index rejects the query ([`LibraryError::SearchIndex`]),
//!    [`FallbackSearch`] retries the same request with [`SubstringSearch`], a
//!    `LIKE` scan over the same fields. The caller never sees the index error.
//!
//! Requests without search text go straight to the substring strategy, which
//! then acts as a plain filtered listing.

use crate::error::{LibraryError, Result};
use crate::models::{Tab, TabRow};
use crate::repositories::tab::{hydrate_tabs, TAB_COLUMNS};
use crate::repositories::{Page, PageRequest};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Text columns a search can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    Title,
    Artist,
    Album,
    Tag,
    Country,
    Language,
}

impl SearchField {
    /// Fields searched when the caller names none.
    pub const DEFAULT: [SearchField; 4] = [
        SearchField::Title,
        SearchField::Artist,
        SearchField::Album,
        SearchField::Tag,
    ];

    /// Column name, identical in `tabs` and `tabs_fts`.
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Artist => "artist",
            SearchField::Album => "album",
            SearchField::Tag => "tag",
            SearchField::Country => "country",
            SearchField::Language => "language",
        }
    }
}

impl FromStr for SearchField {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(SearchField::Title),
            "artist" => Ok(SearchField::Artist),
            "album" => Ok(SearchField::Album),
            "tag" => Ok(SearchField::Tag),
            "country" => Ok(SearchField::Country),
            "language" => Ok(SearchField::Language),
            other => Err(LibraryError::invalid(
                "search_fields",
                format!("unsupported search field: {}", other),
            )),
        }
    }
}

/// Sort keys accepted by [`TabQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TabSortKey {
    Title,
    Artist,
    Album,
    AddedAt,
    LastOpened,
    /// When the tab joined the scoped category (falls back to `AddedAt` unscoped)
    CategoryAddedAt,
    /// Full-text rank (falls back to `Title` without an index match)
    Relevance,
}

impl FromStr for TabSortKey {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "title" => Ok(TabSortKey::Title),
            "artist" => Ok(TabSortKey::Artist),
            "album" => Ok(TabSortKey::Album),
            "addedAt" | "added_at" => Ok(TabSortKey::AddedAt),
            "lastOpened" | "last_opened" => Ok(TabSortKey::LastOpened),
            "categoryAddedAt" | "category_added_at" => Ok(TabSortKey::CategoryAddedAt),
            "relevance" => Ok(TabSortKey::Relevance),
            other => Err(LibraryError::invalid(
                "sort_by",
                format!("unsupported sort key: {}", other),
            )),
        }
    }
}

/// Parameters of a paginated tab listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabQuery {
    /// Restrict to tabs directly associated with this category
    pub category_id: Option<String>,
    pub page: PageRequest,
    /// Search text; empty means no text filter
    pub search: String,
    /// Fields to search; empty means [`SearchField::DEFAULT`]
    pub fields: Vec<SearchField>,
    /// Ignore `category_id` and search the whole library
    pub is_global: bool,
    /// `None` sorts by relevance when searching, else by title
    pub sort_by: Option<TabSortKey>,
    pub sort_desc: bool,
}

impl TabQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.page = PageRequest::new(page, page_size);
        self
    }

    pub fn search(mut self, text: impl Into<String>, fields: &[SearchField]) -> Self {
        self.search = text.into();
        self.fields = fields.to_vec();
        self
    }

    pub fn global(mut self, is_global: bool) -> Self {
        self.is_global = is_global;
        self
    }

    pub fn sort(mut self, key: TabSortKey, descending: bool) -> Self {
        self.sort_by = Some(key);
        self.sort_desc = descending;
        self
    }

    /// Category the listing is restricted to, if any.
    pub fn scope(&self) -> Option<&str> {
        if self.is_global {
            return None;
        }
        self.category_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Trimmed search text, `None` when empty.
    pub fn search_text(&self) -> Option<&str> {
        Some(self.search.trim()).filter(|text| !text.is_empty())
    }

    /// Requested fields, defaulting when none were given.
    pub fn effective_fields(&self) -> Vec<SearchField> {
        if self.fields.is_empty() {
            SearchField::DEFAULT.to_vec()
        } else {
            let mut fields = Vec::with_capacity(self.fields.len());
            for field in &self.fields {
                if !fields.contains(field) {
                    fields.push(*field);
                }
            }
            fields
        }
    }
}

/// A way of turning a [`TabQuery`] into a page of tabs.
#[async_trait]
pub trait SearchStrategy: Send + Sync {
    /// Strategy name for logs.
    fn name(&self) -> &'static str;

    async fn search(&self, pool: &SqlitePool, query: &TabQuery) -> Result<Page<Tab>>;
}

/// Build the FTS5 expression: a prefix phrase per token, restricted to `fields`.
///
/// Tokens are split on non-alphanumeric characters like the index tokenizer
/// does. Returns `None` when nothing indexable remains.
pub fn build_match_expression(text: &str, fields: &[SearchField]) -> Option<String> {
    let tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| format!("\"{}\"*", token))
        .collect();

    if tokens.is_empty() || fields.is_empty() {
        return None;
    }

    let columns: Vec<&str> = fields.iter().map(SearchField::column).collect();
    Some(format!("{{{}}} : ({})", columns.join(" "), tokens.join(" ")))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_scope_join(builder: &mut QueryBuilder<'_, Sqlite>, query: &TabQuery) {
    if let Some(category_id) = query.scope() {
        builder.push(" INNER JOIN tab_categories tc ON tc.tab_id = t.id AND tc.category_id = ");
        builder.push_bind(category_id.to_string());
    }
}

fn order_clause(query: &TabQuery, ranked: bool) -> String {
    let direction = if query.sort_desc { "DESC" } else { "ASC" };
    let key = match query.sort_by {
        Some(key) => key,
        None if ranked => TabSortKey::Relevance,
        None => TabSortKey::Title,
    };

    match key {
        TabSortKey::Title => format!("t.title COLLATE NOCASE {}, t.id ASC", direction),
        TabSortKey::Artist => format!(
            "t.artist COLLATE NOCASE {}, t.title COLLATE NOCASE ASC, t.id ASC",
            direction
        ),
        TabSortKey::Album => format!(
            "t.album COLLATE NOCASE {}, t.title COLLATE NOCASE ASC, t.id ASC",
            direction
        ),
        TabSortKey::AddedAt => format!("t.added_at {}, t.id ASC", direction),
        TabSortKey::LastOpened => format!("COALESCE(t.last_opened, 0) {}, t.id ASC", direction),
        TabSortKey::CategoryAddedAt if query.scope().is_some() => {
            format!("tc.added_at {}, t.id ASC", direction)
        }
        TabSortKey::CategoryAddedAt => format!("t.added_at {}, t.id ASC", direction),
        TabSortKey::Relevance if ranked => {
            "tabs_fts.rank ASC, t.title COLLATE NOCASE ASC, t.id ASC".to_string()
        }
        TabSortKey::Relevance => "t.title COLLATE NOCASE ASC, t.id ASC".to_string(),
    }
}

fn push_page(builder: &mut QueryBuilder<'_, Sqlite>, page: PageRequest) {
    builder.push(" LIMIT ");
    builder.push_bind(i64::from(page.limit()));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
}

async fn run_page(
    pool: &SqlitePool,
    mut count_builder: QueryBuilder<'_, Sqlite>,
    mut select_builder: QueryBuilder<'_, Sqlite>,
) -> std::result::Result<(Vec<TabRow>, i64), sqlx::Error> {
    let mut conn = pool.acquire().await?;

    let total: (i64,) = count_builder
        .build_query_as()
        .fetch_one(&mut *conn)
        .await?;

    let rows = select_builder
        .build_query_as::<TabRow>()
        .fetch_all(&mut *conn)
        .await?;

    Ok((rows, total.0))
}

async fn into_page(
    pool: &SqlitePool,
    rows: Vec<TabRow>,
    total: i64,
    page: PageRequest,
) -> Result<Page<Tab>> {
    let mut conn = pool.acquire().await?;
    let tabs = hydrate_tabs(&mut *conn, rows).await?;
    Ok(Page::new(tabs, total.max(0) as u64, page))
}

/// Ranked prefix search over the full-text index.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullTextSearch;

#[async_trait]
impl SearchStrategy for FullTextSearch {
    fn name(&self) -> &'static str {
        "fts"
    }

    async fn search(&self, pool: &SqlitePool, query: &TabQuery) -> Result<Page<Tab>> {
        let text = query.search_text().unwrap_or_default();
        let expression = build_match_expression(text, &query.effective_fields())
            .ok_or_else(|| {
                LibraryError::SearchIndex(format!("no indexable terms in {:?}", text))
            })?;

        let mut count_builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT COUNT(*) FROM tabs_fts INNER JOIN tabs t ON t.id = tabs_fts.id",
        );
        push_scope_join(&mut count_builder, query);
        count_builder.push(" WHERE tabs_fts MATCH ");
        count_builder.push_bind(expression.clone());

        let mut select_builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM tabs_fts INNER JOIN tabs t ON t.id = tabs_fts.id",
            TAB_COLUMNS
        ));
        push_scope_join(&mut select_builder, query);
        select_builder.push(" WHERE tabs_fts MATCH ");
        select_builder.push_bind(expression.clone());
        select_builder.push(" ORDER BY ");
        select_builder.push(order_clause(query, true));
        push_page(&mut select_builder, query.page);

        let (rows, total) = run_page(pool, count_builder, select_builder)
            .await
            .map_err(|err| match err {
                sqlx::Error::Database(db_err) => LibraryError::SearchIndex(format!(
                    "{} (expression: {})",
                    db_err.message(),
                    expression
                )),
                other => LibraryError::Database(other),
            })?;

        into_page(pool, rows, total, query.page).await
    }
}

/// `LIKE` scan over the requested fields; a plain listing without search text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringSearch;

impl SubstringSearch {
    fn push_filter(builder: &mut QueryBuilder<'_, Sqlite>, query: &TabQuery) {
        let Some(text) = query.search_text() else {
            return;
        };

        let pattern = like_pattern(text);
        builder.push(" WHERE (");
        for (index, field) in query.effective_fields().iter().enumerate() {
            if index > 0 {
                builder.push(" OR ");
            }
            builder.push(format!("t.{} LIKE ", field.column()));
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\'");
        }
        builder.push(")");
    }
}

#[async_trait]
impl SearchStrategy for SubstringSearch {
    fn name(&self) -> &'static str {
        "substring"
    }

    async fn search(&self, pool: &SqlitePool, query: &TabQuery) -> Result<Page<Tab>> {
        let mut count_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM tabs t");
        push_scope_join(&mut count_builder, query);
        Self::push_filter(&mut count_builder, query);

        let mut select_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM tabs t", TAB_COLUMNS));
        push_scope_join(&mut select_builder, query);
        Self::push_filter(&mut select_builder, query);
        select_builder.push(" ORDER BY ");
        select_builder.push(order_clause(query, false));
        push_page(&mut select_builder, query.page);

        let (rows, total) = run_page(pool, count_builder, select_builder).await?;
        into_page(pool, rows, total, query.page).await
    }
}

/// Try `primary`; on a search-index error retry with `fallback`.
pub struct FallbackSearch {
    primary: Box<dyn SearchStrategy>,
    fallback: Box<dyn SearchStrategy>,
}

impl FallbackSearch {
    pub fn new(primary: Box<dyn SearchStrategy>, fallback: Box<dyn SearchStrategy>) -> Self {
        Self { primary, fallback }
    }
}

impl Default for FallbackSearch {
    fn default() -> Self {
        Self::new(Box::new(FullTextSearch), Box::new(SubstringSearch))
    }
}

impl fmt::Debug for FallbackSearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackSearch")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

#[async_trait]
impl SearchStrategy for FallbackSearch {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn search(&self, pool: &SqlitePool, query: &TabQuery) -> Result<Page<Tab>> {
        if query.search_text().is_none() {
            return self.fallback.search(pool, query).await;
        }

        match self.primary.search(pool, query).await {
            Err(LibraryError::SearchIndex(reason)) => {
                debug!(
                    strategy = self.primary.name(),
                    fallback = self.fallback.name(),
                    reason = %reason,
                    "Search index rejected query, retrying with fallback"
                );
                self.fallback.search(pool, query).await
            }
            other => other,
        }
    }
}
