//! # Sync Engine
//!
//! Reconciles the configured directories with the catalog.
//!
//! ## Algorithm
//!
//! For each root in `Settings::sync_paths`, in order:
//!
//! 1. Walk the tree recursively. Unreadable entries are logged and counted
//!    as errors; the walk continues.
//! 2. Skip directories and files without a supported extension.
//! 3. A file whose exact path is already tracked is skipped.
//! 4. Otherwise a candidate tab is built from the metadata extractor, falling
//!    back to the file name when extraction fails.
//! 5. If no tab has the same title, the candidate is inserted and a cover
//!    job is queued.
//! 6. On a title collision the sync strategy decides:
//!    - `Skip` leaves the existing entry alone (`skipped`)
//!    - `Overwrite` inserts the candidate under a `Title_copyN` title
//!      (`updated`). The existing entry is never modified or deleted.
//!
//! Progress is published per processed file and a completion event is always
//! published, including after cancellation.

use crate::error::{Result, SyncError};
use bridge_traits::cover::CoverRequest;
use core_library::{EntityStore, SyncStrategy, Tab, TabType};
use core_metadata::{CoverFetchPool, CoverJob, CoverOutcome, MetadataError};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent, SyncEvent};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

/// Attempts at `_copyN` before falling back to a timestamp suffix.
pub const MAX_COPY_ATTEMPTS: u32 = 100;

/// Counters of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub added: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub total: u64,
    /// True if the run stopped early
    pub cancelled: bool,
}

impl SyncReport {
    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Added => self.added += 1,
            FileOutcome::Copied => self.updated += 1,
            FileOutcome::AlreadyTracked | FileOutcome::TitleTaken => self.skipped += 1,
        }
        self.total += 1;
    }

    fn record_error(&mut self) {
        self.errors += 1;
        self.total += 1;
    }
}

/// What happened to one candidate file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Added,
    /// Inserted under a derived `_copyN` title
    Copied,
    AlreadyTracked,
    /// Title collision under the skip strategy
    TitleTaken,
}

/// Directory reconciliation against the [`EntityStore`].
pub struct SyncEngine {
    config: CoreConfig,
    store: Arc<EntityStore>,
    covers: Arc<CoverFetchPool>,
    events: EventBus,
}

impl SyncEngine {
    pub fn new(
        config: CoreConfig,
        store: Arc<EntityStore>,
        covers: Arc<CoverFetchPool>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            store,
            covers,
            events,
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// Run a full sync to completion.
    pub async fn sync(&self) -> Result<SyncReport> {
        self.sync_with_cancel(CancellationToken::new()).await
    }

    /// Run a sync that stops between files once `cancel` fires.
    ///
    /// A cancelled run returns its partial counts with `cancelled = true` and
    /// does not update the last sync time.
    #[instrument(skip(self, cancel))]
    pub async fn sync_with_cancel(&self, cancel: CancellationToken) -> Result<SyncReport> {
        let settings = self.store.settings();
        let roots = settings.sync_paths.clone();

        info!(
            roots = roots.len(),
            strategy = settings.sync_strategy.as_str(),
            "Starting sync"
        );
        self.emit(CoreEvent::Sync(SyncEvent::Started {
            roots: roots
                .iter()
                .map(|root| root.to_string_lossy().into_owned())
                .collect(),
        }));

        let mut report = SyncReport::default();

        'roots: for root in &roots {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let (candidates, walk_errors) = self.collect_candidates(root).await?;
            report.errors += walk_errors;
            report.total += walk_errors;
            debug!(root = %root.display(), candidates = candidates.len(), "Walked root");

            for path in candidates {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'roots;
                }

                match self.process_file(&path, settings.sync_strategy).await {
                    Ok(outcome) => report.record(outcome),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "Failed to process file");
                        report.record_error();
                    }
                }

                self.emit(CoreEvent::Sync(SyncEvent::Progress {
                    message: format!("Processed {}", file_name(&path)),
                    count: report.total,
                    file_path: path.to_string_lossy().into_owned(),
                }));
            }
        }

        let persisted = if report.cancelled {
            info!(total = report.total, "Sync cancelled");
            Ok(())
        } else {
            self.store
                .set_last_sync_time(self.config.clock.unix_timestamp())
                .await
        };

        self.emit(CoreEvent::Sync(SyncEvent::Completed {
            added: report.added,
            updated: report.updated,
            skipped: report.skipped,
            errors: report.errors,
            total: report.total,
            cancelled: report.cancelled,
        }));

        persisted?;

        info!(
            added = report.added,
            updated = report.updated,
            skipped = report.skipped,
            errors = report.errors,
            "Sync finished"
        );
        Ok(report)
    }

    /// Copy `source` into the managed directory and catalogue the copy.
    ///
    /// The resulting tab is managed: deleting it removes the copy and its
    /// cover.
    #[instrument(skip(self), fields(source = %source.display()))]
    pub async fn import_file(&self, source: &Path) -> Result<Tab> {
        let extension = self
            .config
            .supported_extension(source)
            .ok_or_else(|| SyncError::UnsupportedFile(source.display().to_string()))?;

        tokio::fs::create_dir_all(&self.config.managed_dir).await?;
        let destination = unique_destination(&self.config.managed_dir, source, &extension).await?;
        let file_path = utf8_path(&destination)?;
        tokio::fs::copy(source, &destination).await?;

        let mut tab = self.candidate(&destination, file_path, &extension).await;
        tab.is_managed = true;

        if let Err(err) = self.store.add_tab(&tab).await {
            if let Err(cleanup) = tokio::fs::remove_file(&destination).await {
                warn!(path = %destination.display(), error = %cleanup, "Failed to remove imported copy");
            }
            return Err(err.into());
        }

        info!(tab_id = %tab.id, path = %destination.display(), "Imported managed file");
        self.emit(tab_updated(&tab));
        self.queue_cover(&tab).await;
        Ok(tab)
    }

    /// First free `{title}_copyN`, or a timestamp-suffixed title after
    /// [`MAX_COPY_ATTEMPTS`] attempts.
    pub async fn unique_copy_title(&self, title: &str) -> Result<String> {
        for n in 1..=MAX_COPY_ATTEMPTS {
            let candidate = format!("{}_copy{}", title, n);
            if !self.store.title_exists(&candidate).await? {
                return Ok(candidate);
            }
        }

        Ok(format!(
            "{}_copy{}",
            title,
            self.config.clock.unix_timestamp_millis()
        ))
    }

    async fn collect_candidates(&self, root: &Path) -> Result<(Vec<PathBuf>, u64)> {
        let root = root.to_path_buf();
        let config = self.config.clone();

        tokio::task::spawn_blocking(move || walk_root(&root, &config))
            .await
            .map_err(|err| SyncError::Io(std::io::Error::other(err)))
    }

    async fn process_file(&self, path: &Path, strategy: SyncStrategy) -> Result<FileOutcome> {
        let file_path = utf8_path(path)?;
        if self.store.get_tab_by_path(file_path).await?.is_some() {
            return Ok(FileOutcome::AlreadyTracked);
        }

        let extension = self
            .config
            .supported_extension(path)
            .ok_or_else(|| SyncError::UnsupportedFile(path.display().to_string()))?;
        let mut tab = self.candidate(path, file_path, &extension).await;

        let outcome = match self.store.get_tab_by_title(&tab.title).await? {
            None => FileOutcome::Added,
            Some(existing) => match strategy {
                SyncStrategy::Skip => {
                    debug!(title = %tab.title, existing = %existing.id, "Title taken, skipping");
                    return Ok(FileOutcome::TitleTaken);
                }
                SyncStrategy::Overwrite => {
                    tab.title = self.unique_copy_title(&tab.title).await?;
                    debug!(title = %tab.title, existing = %existing.id, "Title taken, adding copy");
                    FileOutcome::Copied
                }
            },
        };

        self.store.add_tab(&tab).await?;
        self.queue_cover(&tab).await;
        Ok(outcome)
    }

    /// Candidate tab for `path`, never failing.
    async fn candidate(&self, path: &Path, file_path: &str, extension: &str) -> Tab {
        let fallback_title = file_stem(path);

        let (title, artist, album) = match self.config.metadata_extractor.extract(path).await {
            Ok(meta) if !meta.is_untitled() => (meta.title, meta.artist, meta.album),
            Ok(meta) => (fallback_title, meta.artist, meta.album),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "Metadata extraction failed, using file name");
                (fallback_title, String::new(), String::new())
            }
        };

        let mut tab = Tab::new(
            title.trim(),
            file_path,
            self.config.clock.unix_timestamp(),
        );
        tab.artist = artist.trim().to_string();
        tab.album = album.trim().to_string();
        tab.tab_type = if self.config.is_document_extension(extension) {
            TabType::Document
        } else if self.config.is_tablature_extension(extension) {
            TabType::Tablature
        } else {
            TabType::Unknown
        };
        tab
    }

    /// Queue a cover lookup whose result is written back to the store.
    async fn queue_cover(&self, tab: &Tab) {
        let request = CoverRequest {
            artist: tab.artist.clone(),
            album: tab.album.clone(),
            title: tab.title.clone(),
            country: tab.country.clone(),
            language: tab.language.clone(),
        };
        let destination = self.config.covers_dir.join(format!("{}.jpg", tab.id));

        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        let job = CoverJob::new(tab.id.clone(), request, destination).on_complete(move |outcome| {
            Box::pin(async move { apply_cover_outcome(&store, &events, outcome).await })
        });

        match self.covers.submit(job).await {
            Ok(()) => {}
            Err(MetadataError::PoolClosed) => {
                debug!(tab_id = %tab.id, "Cover pool closed, no cover lookup")
            }
            Err(err) => warn!(tab_id = %tab.id, error = %err, "Failed to queue cover lookup"),
        }
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine; the host emitter has already seen it.
        let _ = self.events.emit(event);
    }
}

/// Persist a resolved cover and tell the host, or report the failure.
async fn apply_cover_outcome(store: &EntityStore, events: &EventBus, outcome: CoverOutcome) {
    let CoverOutcome {
        tab_id,
        result_path,
        error,
    } = outcome;

    let Some(path) = result_path else {
        let _ = events.emit(CoreEvent::Library(LibraryEvent::CoverFetchFailed {
            tab_id,
            error: error.unwrap_or_else(|| "no cover available".to_string()),
        }));
        return;
    };

    let path = path.to_string_lossy();
    match store.set_tab_cover(&tab_id, Some(&path)).await {
        Ok(tab) => {
            let _ = events.emit(tab_updated(&tab));
        }
        // Deleted while the lookup ran
        Err(err) if err.is_not_found() => {
            debug!(tab_id = %tab_id, "Tab gone before cover arrived");
            if let Err(err) = tokio::fs::remove_file(&*path).await {
                debug!(tab_id = %tab_id, error = %err, "Could not remove orphaned cover");
            }
        }
        Err(err) => warn!(tab_id = %tab_id, error = %err, "Failed to store cover path"),
    }
}

fn tab_updated(tab: &Tab) -> CoreEvent {
    let tab = serde_json::to_value(tab).unwrap_or_default();
    CoreEvent::Library(LibraryEvent::TabUpdated { tab })
}

/// Supported files under `root` in file-name order, plus the number of
/// entries that could not be read.
fn walk_root(root: &Path, config: &CoreConfig) -> (Vec<PathBuf>, u64) {
    let mut files = Vec::new();
    let mut errors = 0;

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(root = %root.display(), error = %err, "Skipping unreadable entry");
                errors += 1;
                continue;
            }
        };

        if entry.file_type().is_file() && config.is_supported(entry.path()) {
            files.push(entry.into_path());
        }
    }

    (files, errors)
}

/// `{managed_dir}/{stem}.{ext}`, or `{stem}-N.{ext}` if taken.
async fn unique_destination(managed_dir: &Path, source: &Path, extension: &str) -> Result<PathBuf> {
    let stem = file_stem(source);
    let mut candidate = managed_dir.join(format!("{}.{}", stem, extension));

    let mut n = 1;
    while tokio::fs::try_exists(&candidate).await? {
        candidate = managed_dir.join(format!("{}-{}.{}", stem, n, extension));
        n += 1;
    }

    Ok(candidate)
}

/// Stored paths are the catalogue key, so they must round-trip exactly.
/// A lossy conversion would let two distinct names collide.
fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| SyncError::UnsupportedFile(format!("non-UTF-8 path: {}", path.display())))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let mut report = SyncReport::default();
        report.record(FileOutcome::Added);
        report.record(FileOutcome::Copied);
        report.record(FileOutcome::AlreadyTracked);
        report.record(FileOutcome::TitleTaken);
        report.record_error();

        assert_eq!(report.added, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.errors, 1);
        assert_eq!(report.total, 5);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_file_stem_fallback() {
        assert_eq!(file_stem(Path::new("/music/Wonderwall.gp5")), "Wonderwall");
        assert_eq!(file_stem(Path::new("/")), "Untitled");
    }
}
