//! Cover Art Resolution Abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Lookup keys handed to a [`CoverResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverRequest {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub country: String,
    pub language: String,
}

impl CoverRequest {
    /// True when there is nothing meaningful to search for.
    pub fn is_empty(&self) -> bool {
        self.artist.trim().is_empty() && self.album.trim().is_empty() && self.title.trim().is_empty()
    }
}

/// Cover resolver trait
///
/// Looks up cover art for an entry and writes the image to `destination`.
/// The lookup itself (online catalogue, local folder art, embedded images) is
/// up to the implementation.
///
/// # Failure
///
/// Any error means "no cover available". The core reports it through the job
/// callback and never retries on its own.
#[async_trait]
pub trait CoverResolver: Send + Sync {
    /// Resolve cover art for `request` and write it to `destination`.
    async fn resolve(&self, request: &CoverRequest, destination: &Path) -> Result<()>;
}
