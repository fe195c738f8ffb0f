//! Metadata Extraction Abstraction
//!
//! Document-format heuristics live outside the core. The sync engine only
//! needs a title, artist and album for each candidate file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Descriptive fields derived from a document.
///
/// Empty strings mean "unknown"; the core never treats them as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
}

impl ExtractedMetadata {
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
        }
    }

    /// Returns true when no usable title was found.
    pub fn is_untitled(&self) -> bool {
        self.title.trim().is_empty()
    }
}

/// Metadata extractor trait
///
/// Implementations inspect a file (PDF info dictionary, Guitar Pro headers,
/// ChordPro directives, filename conventions, ...) and return what they can.
///
/// # Failure
///
/// Returning an error is non-fatal: the caller falls back to defaults derived
/// from the file name.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::metadata::MetadataExtractor;
///
/// async fn title_of(extractor: &dyn MetadataExtractor, path: &Path) -> String {
///     extractor
///         .extract(path)
///         .await
///         .map(|meta| meta.title)
///         .unwrap_or_default()
/// }
/// ```
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract descriptive metadata from the file at `path`.
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata>;
}
