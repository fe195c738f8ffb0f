//! # Host Bridge Traits
//!
//! Collaborator contracts the library core consumes but does not implement
//! itself.
//!
//! ## Overview
//!
//! The core owns the catalog, the sync walk, the cover worker pool and the
//! directory watcher. Everything that depends on document formats, online
//! lookups or the presentation layer is delegated to a host-provided bridge:
//!
//! ### Library Enrichment
//! - [`MetadataExtractor`](metadata::MetadataExtractor) - Derives title/artist/album from a file
//! - [`CoverResolver`](cover::CoverResolver) - Fetches cover art for an entry into a destination file
//!
//! ### Presentation
//! - [`EventEmitter`](notification::EventEmitter) - Fire-and-forget notifications to the UI layer
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Failure Semantics
//!
//! None of the enrichment bridges are fatal. An extractor failure makes the
//! sync engine fall back to filename-derived defaults, and a resolver failure
//! means "no cover available". Implementations should still return a
//! descriptive [`BridgeError`](error::BridgeError) so the core can log it.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` because they are shared between the
//! sync engine, the cover workers and the watcher task.
//!
//! ## Examples
//!
//! ### Implementing MetadataExtractor
//!
//! ```ignore
//! use bridge_traits::metadata::{ExtractedMetadata, MetadataExtractor};
//! use bridge_traits::error::Result;
//! use async_trait::async_trait;
//! use std::path::Path;
//!
//! pub struct PdfInfoExtractor;
//!
//! #[async_trait]
//! impl MetadataExtractor for PdfInfoExtractor {
//!     async fn extract(&self, path: &Path) -> Result<ExtractedMetadata> {
//!         // Read the document info dictionary
//!         todo!()
//!     }
//! }
//! ```

pub mod cover;
pub mod error;
pub mod metadata;
pub mod notification;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use cover::{CoverRequest, CoverResolver};
pub use metadata::{ExtractedMetadata, MetadataExtractor};
pub use notification::EventEmitter;
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
