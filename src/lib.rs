//! Workspace placeholder crate.
//!
//! This crate exposes the feature flags that map onto the workspace crates
//! (currently `core-service` and its `desktop-shims` defaults). Host
//! applications can depend on `tabshelf-workspace` and get a fully wired
//! library service without pulling each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::{LibraryService, ServiceError};
