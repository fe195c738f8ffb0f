//! Logging event emitter

use bridge_traits::notification::EventEmitter;
use serde_json::Value;
use tracing::info;

/// Emitter used when no presentation layer is attached.
///
/// Every notification is written to the `tabshelf::events` tracing target.
#[derive(Debug, Clone, Default)]
pub struct TracingEventEmitter;

impl TracingEventEmitter {
    pub fn new() -> Self {
        Self
    }
}

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, event_name: &str, payload: Value) {
        info!(target: "tabshelf::events", event = event_name, payload = %payload, "Notification");
    }
}
