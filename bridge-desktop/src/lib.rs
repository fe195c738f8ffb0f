//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `MetadataExtractor` using file-name conventions (`Artist - Title.ext`)
//! - `CoverResolver` using folder art that sits next to the document
//! - `EventEmitter` that records notifications through `tracing`
//! - Platform data directories via the `dirs` crate
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FilenameMetadataExtractor, LocalCoverResolver, TracingEventEmitter};
//! use std::sync::Arc;
//!
//! let extractor = Arc::new(FilenameMetadataExtractor::new());
//! let resolver = Arc::new(LocalCoverResolver::new());
//! let emitter = Arc::new(TracingEventEmitter::new());
//! // Hand these to CoreConfig::builder()
//! ```

mod cover;
mod emitter;
mod extractor;

use std::path::PathBuf;

pub use cover::LocalCoverResolver;
pub use emitter::TracingEventEmitter;
pub use extractor::FilenameMetadataExtractor;

/// Default application data directory (`<data dir>/tabshelf`).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("tabshelf")
}
