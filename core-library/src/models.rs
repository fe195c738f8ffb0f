//! Domain models for the tab library
//!
//! This module contains the catalog entities, their validation and the
//! row types used for database mapping.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

/// Generate a new entity identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Tab
// =============================================================================

/// Kind of document a tab points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabType {
    /// Rendered sheet music (PDF and similar)
    Document,
    /// Tablature formats (Guitar Pro, ASCII tab, ChordPro, ...)
    Tablature,
    #[default]
    Unknown,
}

impl TabType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabType::Document => "document",
            TabType::Tablature => "tablature",
            TabType::Unknown => "unknown",
        }
    }
}

impl FromStr for TabType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(TabType::Document),
            "tablature" => Ok(TabType::Tablature),
            "unknown" => Ok(TabType::Unknown),
            other => Err(format!("Unknown tab type: {}", other)),
        }
    }
}

impl fmt::Display for TabType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked sheet-music or tablature document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// Unique identifier, immutable after creation
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Absolute path of the underlying file (empty for detached entries)
    pub file_path: String,
    #[serde(rename = "type")]
    pub tab_type: TabType,
    /// True if the library owns the file and deletes it with the entry
    pub is_managed: bool,
    pub cover_path: Option<String>,
    /// Associated categories, in assignment order
    pub category_ids: Vec<String>,
    pub country: String,
    pub language: String,
    /// Free-text tag
    pub tag: String,
    /// Unix seconds
    pub added_at: i64,
    /// Unix seconds
    pub last_opened: Option<i64>,
}

impl Tab {
    /// Create a new tab with a fresh id.
    pub fn new(title: impl Into<String>, file_path: impl Into<String>, added_at: i64) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            file_path: file_path.into(),
            tab_type: TabType::Unknown,
            is_managed: false,
            cover_path: None,
            category_ids: Vec::new(),
            country: String::new(),
            language: String::new(),
            tag: String::new(),
            added_at,
            last_opened: None,
        }
    }

    /// First category of the association set.
    ///
    /// Mirrors the deprecated single-category column.
    pub fn primary_category(&self) -> Option<&str> {
        self.category_ids.first().map(String::as_str)
    }

    /// True if a non-empty cover has been recorded.
    pub fn has_cover(&self) -> bool {
        self.cover_path.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Tab id cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Tab title cannot be empty".to_string());
        }

        let mut seen = HashSet::new();
        for category_id in &self.category_ids {
            if category_id.is_empty() {
                return Err("Category id cannot be empty".to_string());
            }
            if !seen.insert(category_id.as_str()) {
                return Err(format!("Duplicate category id: {}", category_id));
            }
        }

        Ok(())
    }
}

/// Database row for `tabs`; associations are loaded separately.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct TabRow {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub file_path: String,
    pub tab_type: String,
    pub is_managed: bool,
    pub cover_path: Option<String>,
    pub country: String,
    pub language: String,
    pub tag: String,
    pub added_at: i64,
    pub last_opened: Option<i64>,
}

impl TabRow {
    pub(crate) fn into_tab(self, category_ids: Vec<String>) -> Tab {
        let tab_type = self.tab_type.parse().unwrap_or_else(|err: String| {
            warn!(tab_id = %self.id, error = %err, "Unrecognised tab type in database");
            TabType::Unknown
        });

        Tab {
            id: self.id,
            title: self.title,
            artist: self.artist,
            album: self.album,
            file_path: self.file_path,
            tab_type,
            is_managed: self.is_managed,
            cover_path: self.cover_path,
            category_ids,
            country: self.country,
            language: self.language,
            tag: self.tag,
            added_at: self.added_at,
            last_opened: self.last_opened,
        }
    }
}

// =============================================================================
// Category
// =============================================================================

/// User-defined, hierarchical grouping of tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    /// `None` for root categories
    pub parent_id: Option<String>,
    /// Explicit cover override
    pub cover_path: Option<String>,
    /// Override, else the cover of the earliest-added tab that has one
    pub effective_cover_path: Option<String>,
    pub created_at: i64,
}

impl Category {
    pub fn new(name: impl Into<String>, parent_id: Option<String>, created_at: i64) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            parent_id,
            cover_path: None,
            effective_cover_path: None,
            created_at,
        }
    }

    /// Create a category with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            ..Self::new(name, None, created_at)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Category id cannot be empty".to_string());
        }

        if self.name.trim().is_empty() {
            return Err("Category name cannot be empty".to_string());
        }

        if self.parent_id.as_deref() == Some(self.id.as_str()) {
            return Err("Category cannot be its own parent".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// Settings
// =============================================================================

/// How a sync reacts when a scanned file's title matches an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Leave the existing entry alone and count the file as skipped.
    #[default]
    Skip,
    /// Insert the file as an additional entry under a `_copyN` title.
    ///
    /// Despite the name, nothing is overwritten or deleted: the existing
    /// entry is kept untouched.
    Overwrite,
}

impl SyncStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStrategy::Skip => "skip",
            SyncStrategy::Overwrite => "overwrite",
        }
    }
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skip" => Ok(SyncStrategy::Skip),
            "overwrite" => Ok(SyncStrategy::Overwrite),
            other => Err(format!("Unknown sync strategy: {}", other)),
        }
    }
}

/// When automatic syncs run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoSyncFrequency {
    /// Every time the library starts
    #[default]
    Startup,
    Weekly,
    Monthly,
    Yearly,
}

impl AutoSyncFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoSyncFrequency::Startup => "startup",
            AutoSyncFrequency::Weekly => "weekly",
            AutoSyncFrequency::Monthly => "monthly",
            AutoSyncFrequency::Yearly => "yearly",
        }
    }

    /// Minimum seconds between two automatic syncs (`None` for startup).
    pub fn interval_secs(&self) -> Option<i64> {
        const DAY: i64 = 24 * 60 * 60;
        match self {
            AutoSyncFrequency::Startup => None,
            AutoSyncFrequency::Weekly => Some(7 * DAY),
            AutoSyncFrequency::Monthly => Some(30 * DAY),
            AutoSyncFrequency::Yearly => Some(365 * DAY),
        }
    }
}

impl FromStr for AutoSyncFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "startup" => Ok(AutoSyncFrequency::Startup),
            "weekly" => Ok(AutoSyncFrequency::Weekly),
            "monthly" => Ok(AutoSyncFrequency::Monthly),
            "yearly" => Ok(AutoSyncFrequency::Yearly),
            other => Err(format!("Unknown auto-sync frequency: {}", other)),
        }
    }
}

/// Persisted library preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Directories to reconcile, in scan order
    pub sync_paths: Vec<PathBuf>,
    pub sync_strategy: SyncStrategy,
    pub auto_sync_enabled: bool,
    pub auto_sync_frequency: AutoSyncFrequency,
    /// Unix seconds of the last completed sync
    pub last_sync_time: Option<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_paths: Vec::new(),
            sync_strategy: SyncStrategy::Skip,
            auto_sync_enabled: true,
            auto_sync_frequency: AutoSyncFrequency::Startup,
            last_sync_time: None,
        }
    }
}

pub(crate) const KEY_SYNC_PATHS: &str = "sync_paths";
pub(crate) const KEY_SYNC_STRATEGY: &str = "sync_strategy";
pub(crate) const KEY_AUTO_SYNC_ENABLED: &str = "auto_sync_enabled";
pub(crate) const KEY_AUTO_SYNC_FREQUENCY: &str = "auto_sync_frequency";
pub(crate) const KEY_LAST_SYNC_TIME: &str = "last_sync_time";

impl Settings {
    /// Whether an automatic sync should run at `now` (Unix seconds).
    pub fn is_auto_sync_due(&self, now: i64) -> bool {
        if !self.auto_sync_enabled {
            return false;
        }

        match (self.auto_sync_frequency.interval_secs(), self.last_sync_time) {
            (None, _) => true,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => now.saturating_sub(last) >= interval,
        }
    }

    /// Flatten into the key/value rows of the settings table.
    pub(crate) fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let paths: Vec<String> = self
            .sync_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let mut pairs = vec![
            (
                KEY_SYNC_PATHS,
                serde_json::to_string(&paths).unwrap_or_else(|_| "[]".to_string()),
            ),
            (KEY_SYNC_STRATEGY, self.sync_strategy.as_str().to_string()),
            (KEY_AUTO_SYNC_ENABLED, self.auto_sync_enabled.to_string()),
            (
                KEY_AUTO_SYNC_FREQUENCY,
                self.auto_sync_frequency.as_str().to_string(),
            ),
        ];

        if let Some(last) = self.last_sync_time {
            pairs.push((KEY_LAST_SYNC_TIME, last.to_string()));
        }

        pairs
    }

    /// Rebuild from key/value rows. Missing or malformed values keep their defaults.
    pub(crate) fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let mut settings = Settings::default();

        if let Some(raw) = pairs.get(KEY_SYNC_PATHS) {
            match serde_json::from_str::<Vec<String>>(raw) {
                Ok(paths) => settings.sync_paths = paths.into_iter().map(PathBuf::from).collect(),
                Err(err) => warn!(error = %err, "Ignoring malformed sync_paths setting"),
            }
        }

        if let Some(raw) = pairs.get(KEY_SYNC_STRATEGY) {
            match raw.parse() {
                Ok(strategy) => settings.sync_strategy = strategy,
                Err(err) => warn!(error = %err, "Ignoring malformed sync_strategy setting"),
            }
        }

        if let Some(raw) = pairs.get(KEY_AUTO_SYNC_ENABLED) {
            match raw.parse() {
                Ok(enabled) => settings.auto_sync_enabled = enabled,
                Err(_) => warn!(value = %raw, "Ignoring malformed auto_sync_enabled setting"),
            }
        }

        if let Some(raw) = pairs.get(KEY_AUTO_SYNC_FREQUENCY) {
            match raw.parse() {
                Ok(frequency) => settings.auto_sync_frequency = frequency,
                Err(err) => warn!(error = %err, "Ignoring malformed auto_sync_frequency setting"),
            }
        }

        if let Some(raw) = pairs.get(KEY_LAST_SYNC_TIME) {
            match raw.parse() {
                Ok(last) => settings.last_sync_time = Some(last),
                Err(_) => warn!(value = %raw, "Ignoring malformed last_sync_time setting"),
            }
        }

        settings
    }
}
