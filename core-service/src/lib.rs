//! Library service façade.
//!
//! Wires the host-provided bridges from [`CoreConfig`] into the store, the
//! sync engine, the cover worker pool and the directory watcher, and exposes
//! the result as a single [`LibraryService`]. Desktop hosts enable the
//! `desktop-shims` feature so missing bridges default to `bridge-desktop`.

pub mod error;
pub mod service;

pub use error::{Result, ServiceError};
pub use service::LibraryService;

pub use core_library::{Category, Page, Settings, SyncStrategy, Tab, TabQuery};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventBus};
pub use core_sync::SyncReport;
