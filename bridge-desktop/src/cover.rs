//! Folder-art cover resolver

use async_trait::async_trait;
use bridge_traits::{
    cover::{CoverRequest, CoverResolver},
    error::{BridgeError, Result},
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const DEFAULT_CANDIDATES: &[&str] = &[
    "cover.jpg",
    "cover.jpeg",
    "cover.png",
    "folder.jpg",
    "folder.png",
    "front.jpg",
];

/// Resolves covers from image files found in a set of search directories.
///
/// For each search directory, `<artist> - <album>.jpg` is tried first, then
/// the generic folder-art names (`cover.jpg`, `folder.png`, ...). The first
/// hit is copied to the destination.
#[derive(Debug, Clone, Default)]
pub struct LocalCoverResolver {
    search_dirs: Vec<PathBuf>,
}

impl LocalCoverResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to search for cover images.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dirs.push(dir.into());
        self
    }

    fn candidates(&self, request: &CoverRequest) -> Vec<PathBuf> {
        let mut names = Vec::new();
        if !request.artist.is_empty() && !request.album.is_empty() {
            names.push(format!("{} - {}.jpg", request.artist, request.album));
        }
        if !request.artist.is_empty() && !request.title.is_empty() {
            names.push(format!("{} - {}.jpg", request.artist, request.title));
        }
        names.extend(DEFAULT_CANDIDATES.iter().map(|name| name.to_string()));

        self.search_dirs
            .iter()
            .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
            .collect()
    }
}

#[async_trait]
impl CoverResolver for LocalCoverResolver {
    async fn resolve(&self, request: &CoverRequest, destination: &Path) -> Result<()> {
        if request.is_empty() {
            return Err(BridgeError::OperationFailed(
                "no artist, album or title to look up".to_string(),
            ));
        }

        for candidate in self.candidates(request) {
            if fs::metadata(&candidate).await.map(|m| m.is_file()).unwrap_or(false) {
                if let Some(parent) = destination.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::copy(&candidate, destination).await?;
                debug!(
                    source = %candidate.display(),
                    destination = %destination.display(),
                    "Copied local cover art"
                );
                return Ok(());
            }
        }

        Err(BridgeError::NotAvailable(format!(
            "no local cover for {} / {}",
            request.artist, request.title
        )))
    }
}
