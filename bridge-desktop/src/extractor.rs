//! Filename-based metadata extraction

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    metadata::{ExtractedMetadata, MetadataExtractor},
};
use std::path::Path;
use tracing::trace;

/// Derives metadata from the file name alone.
///
/// Recognised shapes:
/// - `Artist - Title.ext`
/// - `Artist - Album - Title.ext`
/// - `Title.ext`
///
/// Underscores are treated as spaces.
#[derive(Debug, Clone, Default)]
pub struct FilenameMetadataExtractor;

impl FilenameMetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    fn parse_stem(stem: &str) -> ExtractedMetadata {
        let cleaned = stem.replace('_', " ");
        let parts: Vec<&str> = cleaned
            .split(" - ")
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        match parts.as_slice() {
            [artist, album, title, ..] => ExtractedMetadata::new(*title, *artist, *album),
            [artist, title] => ExtractedMetadata::new(*title, *artist, ""),
            [title] => ExtractedMetadata::new(*title, "", ""),
            [] => ExtractedMetadata::new(cleaned.trim(), "", ""),
        }
    }
}

#[async_trait]
impl MetadataExtractor for FilenameMetadataExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedMetadata> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| BridgeError::unreadable(path, "file name is not valid UTF-8"))?;

        let metadata = Self::parse_stem(stem);
        if metadata.is_untitled() {
            return Err(BridgeError::unreadable(path, "no title in file name"));
        }

        trace!(path = %path.display(), title = %metadata.title, "Extracted metadata from file name");
        Ok(metadata)
    }
}
