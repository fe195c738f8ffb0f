//! # Event Bus System
//!
//! Provides an event-driven architecture for the library core using `tokio::sync::broadcast`.
//! This module enables decoupled communication between the sync engine, the cover
//! workers and the host application through typed events.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for sync and library changes
//! - **EventBus**: Central broadcast channel for publishing events
//! - **Host forwarding**: Every event is also handed to the configured
//!   [`EventEmitter`] under its wire name (`sync-progress`, `tab-updated`, ...)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     emit      ┌───────────┐     subscribe    ┌────────────┐
//! │ SyncEngine  ├──────────────>│           ├─────────────────>│ Subscriber │
//! └─────────────┘               │ EventBus  │                  └────────────┘
//! ┌─────────────┐     emit      │ (broadcast│  emit(name, json) ┌────────────┐
//! │Cover workers├──────────────>│  channel) ├─────────────────>│ Host (UI)  │
//! └─────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus.emit(CoreEvent::Sync(SyncEvent::Started { roots: vec![] })).ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.name(), "sync-started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! The event bus uses `tokio::sync::broadcast`, which can produce two types of errors:
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: The bus was dropped.
//!
//! `emit` returning an error only means there was no in-process subscriber;
//! the host emitter has still been notified.

use bridge_traits::EventEmitter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::SendError};

pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Progress events are emitted once per scanned file, so subscribers that
/// can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Directory reconciliation events
    Sync(SyncEvent),
    /// Catalog content events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Wire name delivered to the host emitter.
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::Sync(SyncEvent::Started { .. }) => "sync-started",
            CoreEvent::Sync(SyncEvent::Progress { .. }) => "sync-progress",
            CoreEvent::Sync(SyncEvent::Completed { .. }) => "sync-completed",
            CoreEvent::Library(LibraryEvent::TabUpdated { .. }) => "tab-updated",
            CoreEvent::Library(LibraryEvent::CoverFetchFailed { .. }) => "cover-fetch-failed",
        }
    }

    /// JSON payload delivered to the host emitter (camelCase keys).
    pub fn payload(&self) -> Value {
        match self {
            CoreEvent::Sync(SyncEvent::Started { roots }) => json!({ "roots": roots }),
            CoreEvent::Sync(SyncEvent::Progress {
                message,
                count,
                file_path,
            }) => json!({
                "message": message,
                "count": count,
                "filePath": file_path,
            }),
            CoreEvent::Sync(SyncEvent::Completed {
                added,
                updated,
                skipped,
                errors,
                total,
                cancelled,
            }) => json!({
                "added": added,
                "updated": updated,
                "skipped": skipped,
                "errors": errors,
                "total": total,
                "cancelled": cancelled,
            }),
            CoreEvent::Library(LibraryEvent::TabUpdated { tab }) => json!({ "tab": tab }),
            CoreEvent::Library(LibraryEvent::CoverFetchFailed { tab_id, error }) => json!({
                "tabId": tab_id,
                "error": error,
            }),
        }
    }
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to reconciling watched directories with the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A sync run began.
    Started {
        /// Root directories in scan order.
        roots: Vec<String>,
    },
    /// One candidate file was processed.
    Progress {
        /// Human-readable status line.
        message: String,
        /// Files processed so far in this run.
        count: u64,
        /// The file just processed.
        file_path: String,
    },
    /// A sync run finished (or was cancelled part-way).
    Completed {
        added: u64,
        updated: u64,
        skipped: u64,
        errors: u64,
        total: u64,
        cancelled: bool,
    },
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to catalog content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// A tab was added or changed; `tab` is its serialized form.
    TabUpdated { tab: Value },
    /// Cover lookup failed for a tab; it stays coverless.
    CoverFetchFailed { tab_id: String, error: String },
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning is cheap; all clones share the same channel and host emitter.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
    emitter: Option<Arc<dyn EventEmitter>>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            emitter: None,
        }
    }

    /// Creates a bus that also forwards every event to a host emitter.
    pub fn with_emitter(capacity: usize, emitter: Arc<dyn EventEmitter>) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            emitter: Some(emitter),
        }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to the host emitter and all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// Returns an error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event.name(), event.payload());
        }
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("has_emitter", &self.emitter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        events: Mutex<Vec<(String, Value)>>,
    }

    impl EventEmitter for RecordingEmitter {
        fn emit(&self, event_name: &str, payload: Value) {
            self.events.lock().push((event_name.to_string(), payload));
        }
    }

    fn completed(errors: u64) -> CoreEvent {
        CoreEvent::Sync(SyncEvent::Completed {
            added: 2,
            updated: 1,
            skipped: 3,
            errors,
            total: 6 + errors,
            cancelled: false,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(completed(0)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Sync(SyncEvent::Started {
            roots: vec!["/music".to_string()],
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_host_emitter_receives_wire_names() {
        let emitter = Arc::new(RecordingEmitter::default());
        let bus = EventBus::with_emitter(10, emitter.clone());

        // No subscribers: the host still gets the event.
        bus.emit(CoreEvent::Sync(SyncEvent::Progress {
            message: "Added Wonderwall".to_string(),
            count: 1,
            file_path: "/music/Wonderwall.pdf".to_string(),
        }))
        .ok();
        bus.emit(completed(0)).ok();

        let events = emitter.events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, "sync-progress");
        assert_eq!(events[0].1["filePath"], "/music/Wonderwall.pdf");
        assert_eq!(events[0].1["count"], 1);
        assert_eq!(events[1].0, "sync-completed");
        assert_eq!(events[1].1["total"], 6);
    }

    #[test]
    fn test_event_names() {
        let tab_updated = CoreEvent::Library(LibraryEvent::TabUpdated {
            tab: json!({ "id": "t1" }),
        });
        let failed = CoreEvent::Library(LibraryEvent::CoverFetchFailed {
            tab_id: "t1".to_string(),
            error: "not found".to_string(),
        });

        assert_eq!(tab_updated.name(), "tab-updated");
        assert_eq!(tab_updated.payload()["tab"]["id"], "t1");
        assert_eq!(failed.name(), "cover-fetch-failed");
        assert_eq!(failed.payload()["tabId"], "t1");
    }




    #[test]
    fn test_event_serialization() {
        let event = completed(1);
        let json = serde_json::to_string(&event).unwrap();
        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
