//! # Sync & Watching
//!
//! Keeps the catalog in step with the configured directories.
//!
//! ## Components
//!
//! - **Sync Engine** (`engine`): walks the sync roots and reconciles every
//!   supported file with the [`core_library::EntityStore`], queueing cover
//!   lookups for new entries
//! - **Directory Watcher** (`watcher`): debounced filesystem notifications
//!   that tell the host a sync is worth running

pub mod engine;
pub mod error;
pub mod watcher;

pub use engine::{SyncEngine, SyncReport, MAX_COPY_ATTEMPTS};
pub use error::{Result, SyncError};
pub use watcher::{ChangeCallback, DirectoryWatcher};
