//! # Core Configuration Module
//!
//! Provides configuration management for the library core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds the process wiring for the library: where the catalog
//! database lives, where cover images and managed files are written, how the
//! cover worker pool and the directory watcher are sized, and which bridge
//! implementations the core talks to. It enforces fail-fast validation.
//!
//! User-facing preferences (sync paths, conflict strategy, auto-sync
//! schedule) are **not** part of `CoreConfig`; they are persisted by the
//! entity store and reloaded after every write.
//!
//! ## Required Dependencies
//!
//! - `MetadataExtractor` - Derives title/artist/album during sync
//! - `CoverResolver` - Fetches cover art for new entries
//! - `EventEmitter` - Notifies the presentation layer
//!
//! When the `desktop-shims` feature is enabled, `bridge-desktop` defaults are
//! injected for any missing bridge, and the database path defaults to the
//! platform data directory.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/library.db")
//!     .covers_dir("/path/to/covers")
//!     .cover_workers(4)
//!     .watch_debounce(Duration::from_millis(500))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{Clock, CoverResolver, EventEmitter, MetadataExtractor, SystemClock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default number of cover fetch workers.
pub const DEFAULT_COVER_WORKERS: usize = 3;

/// Default capacity of the cover job queue.
pub const DEFAULT_COVER_QUEUE_CAPACITY: usize = 100;

/// Default quiescence window for the directory watcher.
pub const DEFAULT_WATCH_DEBOUNCE: Duration = Duration::from_secs(1);

/// Extensions catalogued as documents (rendered sheet music).
pub const DEFAULT_DOCUMENT_EXTENSIONS: &[&str] = &["pdf"];

/// Extensions catalogued as tablature.
pub const DEFAULT_TABLATURE_EXTENSIONS: &[&str] = &[
    "gp", "gp3", "gp4", "gp5", "gpx", "gp7", "tg", "ptb", "txt", "tab", "crd", "chopro",
];

/// Core configuration for the library.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite catalog database
    pub database_path: PathBuf,

    /// Directory where fetched cover images are written (`{id}.jpg`)
    pub covers_dir: PathBuf,

    /// Directory that owns copies of imported (managed) files
    pub managed_dir: PathBuf,

    /// Number of persistent cover fetch workers
    pub cover_workers: usize,

    /// Bounded capacity of the cover job queue
    pub cover_queue_capacity: usize,

    /// Quiescence window before a burst of filesystem events triggers a sync
    pub watch_debounce: Duration,

    /// Buffer size of the in-process event bus
    pub event_buffer_size: usize,

    /// Lowercase extensions catalogued as documents
    pub document_extensions: Vec<String>,

    /// Lowercase extensions catalogued as tablature
    pub tablature_extensions: Vec<String>,

    pub metadata_extractor: Arc<dyn MetadataExtractor>,
    pub cover_resolver: Arc<dyn CoverResolver>,
    pub event_emitter: Arc<dyn EventEmitter>,
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("covers_dir", &self.covers_dir)
            .field("managed_dir", &self.managed_dir)
            .field("cover_workers", &self.cover_workers)
            .field("cover_queue_capacity", &self.cover_queue_capacity)
            .field("watch_debounce", &self.watch_debounce)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("document_extensions", &self.document_extensions)
            .field("tablature_extensions", &self.tablature_extensions)
            .field("metadata_extractor", &"MetadataExtractor { ... }")
            .field("cover_resolver", &"CoverResolver { ... }")
            .field("event_emitter", &"EventEmitter { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Paths are not empty
    /// - Worker and queue sizes are at least one
    /// - The debounce window is non-zero
    /// - At least one extension is supported
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.covers_dir.as_os_str().is_empty() {
            return Err(Error::Config("Covers directory cannot be empty".to_string()));
        }

        if self.managed_dir.as_os_str().is_empty() {
            return Err(Error::Config("Managed directory cannot be empty".to_string()));
        }

        if self.cover_workers == 0 {
            return Err(Error::Config(
                "Cover worker count must be at least 1".to_string(),
            ));
        }

        if self.cover_queue_capacity == 0 {
            return Err(Error::Config(
                "Cover queue capacity must be at least 1".to_string(),
            ));
        }

        if self.watch_debounce.is_zero() {
            return Err(Error::Config(
                "Watch debounce window must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be at least 1".to_string(),
            ));
        }

        if self.document_extensions.is_empty() && self.tablature_extensions.is_empty() {
            return Err(Error::Config(
                "At least one supported file extension is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Lowercased extension of `path` if it is one the library catalogues.
    pub fn supported_extension(&self, path: &Path) -> Option<String> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if self.is_document_extension(&ext) || self.is_tablature_extension(&ext) {
            Some(ext)
        } else {
            None
        }
    }

    /// True if `path` has a supported extension.
    pub fn is_supported(&self, path: &Path) -> bool {
        self.supported_extension(path).is_some()
    }

    pub fn is_document_extension(&self, ext: &str) -> bool {
        self.document_extensions.iter().any(|e| e == ext)
    }

    pub fn is_tablature_extension(&self, ext: &str) -> bool {
        self.tablature_extensions.iter().any(|e| e == ext)
    }

    /// All supported extensions, documents first.
    pub fn supported_extensions(&self) -> Vec<String> {
        self.document_extensions
            .iter()
            .chain(self.tablature_extensions.iter())
            .cloned()
            .collect()
    }
}

fn normalize_extensions(extensions: Vec<String>) -> Vec<String> {
    extensions
        .into_iter()
        .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn default_extensions(list: &[&str]) -> Vec<String> {
    list.iter().map(|ext| ext.to_string()).collect()
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required. \
             Desktop: enable the 'desktop-shims' feature to use the bridge-desktop default. \
             Other hosts: inject a platform implementation through CoreConfig::builder().",
            capability
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_extractor() -> Result<Arc<dyn MetadataExtractor>> {
    Ok(Arc::new(bridge_desktop::FilenameMetadataExtractor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_extractor() -> Result<Arc<dyn MetadataExtractor>> {
    Err(capability_missing("MetadataExtractor"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_resolver() -> Result<Arc<dyn CoverResolver>> {
    Ok(Arc::new(
        bridge_desktop::LocalCoverResolver::new()
            .with_search_dir(bridge_desktop::default_data_dir().join("artwork")),
    ))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_resolver() -> Result<Arc<dyn CoverResolver>> {
    Err(capability_missing("CoverResolver"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_emitter() -> Result<Arc<dyn EventEmitter>> {
    Ok(Arc::new(bridge_desktop::TracingEventEmitter::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_emitter() -> Result<Arc<dyn EventEmitter>> {
    Err(capability_missing("EventEmitter"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_database_path() -> Result<PathBuf> {
    Ok(bridge_desktop::default_data_dir().join("library.db"))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_database_path() -> Result<PathBuf> {
    Err(Error::Config(
        "Database path is required. Use .database_path() to set it.".to_string(),
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Unset sizes fall back to the `DEFAULT_*` constants; unset bridges fall
/// back to the desktop shims when that feature is enabled.
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    covers_dir: Option<PathBuf>,
    managed_dir: Option<PathBuf>,
    cover_workers: Option<usize>,
    cover_queue_capacity: Option<usize>,
    watch_debounce: Option<Duration>,
    event_buffer_size: Option<usize>,
    document_extensions: Option<Vec<String>>,
    tablature_extensions: Option<Vec<String>>,
    metadata_extractor: Option<Arc<dyn MetadataExtractor>>,
    cover_resolver: Option<Arc<dyn CoverResolver>>,
    event_emitter: Option<Arc<dyn EventEmitter>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    /// Sets the catalog database path.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the directory cover images are written to.
    ///
    /// Defaults to `covers/` next to the database.
    pub fn covers_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.covers_dir = Some(path.into());
        self
    }

    /// Sets the directory imported files are copied into.
    ///
    /// Defaults to `files/` next to the database.
    pub fn managed_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.managed_dir = Some(path.into());
        self
    }

    pub fn cover_workers(mut self, workers: usize) -> Self {
        self.cover_workers = Some(workers);
        self
    }

    pub fn cover_queue_capacity(mut self, capacity: usize) -> Self {
        self.cover_queue_capacity = Some(capacity);
        self
    }

    pub fn watch_debounce(mut self, window: Duration) -> Self {
        self.watch_debounce = Some(window);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Replaces the document extension list (leading dots are stripped).
    pub fn document_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the tablature extension list (leading dots are stripped).
    pub fn tablature_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tablature_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    pub fn metadata_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.metadata_extractor = Some(extractor);
        self
    }

    pub fn cover_resolver(mut self, resolver: Arc<dyn CoverResolver>) -> Self {
        self.cover_resolver = Some(resolver);
        self
    }

    pub fn event_emitter(mut self, emitter: Arc<dyn EventEmitter>) -> Self {
        self.event_emitter = Some(emitter);
        self
    }

    /// Overrides the time source (defaults to [`SystemClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A required bridge is missing and no desktop default is available
    /// - Validation fails (see [`CoreConfig::validate`])
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = match self.database_path {
            Some(path) => path,
            None => provide_default_database_path()?,
        };

        let base_dir = database_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let covers_dir = self.covers_dir.unwrap_or_else(|| base_dir.join("covers"));
        let managed_dir = self.managed_dir.unwrap_or_else(|| base_dir.join("files"));

        let metadata_extractor = match self.metadata_extractor {
            Some(extractor) => extractor,
            None => provide_default_extractor()?,
        };

        let cover_resolver = match self.cover_resolver {
            Some(resolver) => resolver,
            None => provide_default_resolver()?,
        };

        let event_emitter = match self.event_emitter {
            Some(emitter) => emitter,
            None => provide_default_emitter()?,
        };

        let config = CoreConfig {
            database_path,
            covers_dir,
            managed_dir,
            cover_workers: self.cover_workers.unwrap_or(DEFAULT_COVER_WORKERS),
            cover_queue_capacity: self
                .cover_queue_capacity
                .unwrap_or(DEFAULT_COVER_QUEUE_CAPACITY),
            watch_debounce: self.watch_debounce.unwrap_or(DEFAULT_WATCH_DEBOUNCE),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            document_extensions: normalize_extensions(
                self.document_extensions
                    .unwrap_or_else(|| default_extensions(DEFAULT_DOCUMENT_EXTENSIONS)),
            ),
            tablature_extensions: normalize_extensions(
                self.tablature_extensions
                    .unwrap_or_else(|| default_extensions(DEFAULT_TABLATURE_EXTENSIONS)),
            ),
            metadata_extractor,
            cover_resolver,
            event_emitter,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::cover::CoverRequest;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::metadata::ExtractedMetadata;
    use serde_json::Value;

    struct StubExtractor;

    #[async_trait]
    impl MetadataExtractor for StubExtractor {
        async fn extract(&self, _path: &Path) -> BridgeResult<ExtractedMetadata> {
            Ok(ExtractedMetadata::default())
        }
    }

    struct StubResolver;

    #[async_trait]
    impl CoverResolver for StubResolver {
        async fn resolve(&self, _request: &CoverRequest, _destination: &Path) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct StubEmitter;

    impl EventEmitter for StubEmitter {
        fn emit(&self, _event_name: &str, _payload: Value) {}
    }

    fn builder() -> CoreConfigBuilder {
        CoreConfig::builder()
            .database_path("/data/library.db")
            .metadata_extractor(Arc::new(StubExtractor))
            .cover_resolver(Arc::new(StubResolver))
            .event_emitter(Arc::new(StubEmitter))
    }

    #[test]
    fn test_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.cover_workers, DEFAULT_COVER_WORKERS);
        assert_eq!(config.cover_queue_capacity, DEFAULT_COVER_QUEUE_CAPACITY);
        assert_eq!(config.watch_debounce, DEFAULT_WATCH_DEBOUNCE);
        assert_eq!(config.covers_dir, PathBuf::from("/data/covers"));
        assert_eq!(config.managed_dir, PathBuf::from("/data/files"));
        assert!(config.is_document_extension("pdf"));
        assert!(config.is_tablature_extension("gp5"));
    }

    #[test]
    fn test_extension_normalization() {
        let config = builder()
            .document_extensions([".PDF"])
            .tablature_extensions(["Gp5", ""])
            .build()
            .unwrap();

        assert_eq!(config.document_extensions, vec!["pdf".to_string()]);
        assert_eq!(config.tablature_extensions, vec!["gp5".to_string()]);
        assert!(config.is_supported(Path::new("/a/Song.PDF")));
        assert!(!config.is_supported(Path::new("/a/notes.docx")));
        assert!(!config.is_supported(Path::new("/a/no_extension")));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = builder().cover_workers(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_queue_rejected() {
        let result = builder().cover_queue_capacity(0).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let result = builder().watch_debounce(Duration::ZERO).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_no_extensions_rejected() {
        let result = builder()
            .document_extensions(Vec::<String>::new())
            .tablature_extensions(Vec::<String>::new())
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_bridge_is_reported() {
        let result = CoreConfig::builder()
            .database_path("/data/library.db")
            .build();
        match result {
            Err(Error::CapabilityMissing { capability, message }) => {
                assert_eq!(capability, "MetadataExtractor");
                assert!(message.contains("desktop-shims"));
            }
            other => panic!("expected a missing capability, got {:?}", other.map(|_| ())),
        }

        let result = CoreConfig::builder().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_defaults_fill_bridges() {
        let config = CoreConfig::builder()
            .database_path("/data/library.db")
            .build()
            .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/data/library.db"));
    }
}
