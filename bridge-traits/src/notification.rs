//! Presentation-layer notifications

use serde_json::Value;

/// Event emitter trait
///
/// Delivers named notifications (`sync-started`, `sync-progress`,
/// `sync-completed`, `tab-updated`, `cover-fetch-failed`) to the host UI.
///
/// Emission is fire-and-forget: there is no acknowledgment, and
/// implementations must not block the caller.
pub trait EventEmitter: Send + Sync {
    /// Emit `event_name` with a JSON payload.
    fn emit(&self, event_name: &str, payload: Value);
}
