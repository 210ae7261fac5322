//! Application event system
//!
//! Provides the shared event definitions and the EventBus used by every
//! rollcall component. The front door, the autosave task, and the remote sync
//! client all publish and subscribe through this one bus instead of keeping
//! their own listener registries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Which external source populated the roster at startup.
///
/// Also selects the autosave method: a store-backed roster autosaves to the
/// backing store, a sheet-backed roster autosaves to the sheet file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterSource {
    /// Populated from the relational backing store
    Store,
    /// Populated from the roster sheet file (backing store empty/unavailable)
    Sheet,
    /// Nothing to load; roster starts empty
    Empty,
}

/// rollcall event types
///
/// Events are broadcast via [`EventBus`] and can be serialized for the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AppEvent {
    /// Roster finished populating from its source; autosave may start
    RosterReady {
        /// Where the initial data came from
        source: RosterSource,
        /// When population completed
        timestamp: DateTime<Utc>,
    },

    /// A participant checked in (or was newly registered)
    ParticipantRegistered {
        /// External participant id
        id: String,
        /// Whether this was a first-ever appearance
        is_new: bool,
        /// When the registration happened
        timestamp: DateTime<Utc>,
    },

    /// The current session was renamed by an admin command
    SessionRenamed {
        /// Session key (unchanged by rename)
        key: String,
        /// New human-readable name
        name: String,
    },

    /// Remote sync connection acknowledged by the aggregation server
    RemoteConnected {
        /// Client id assigned by the server
        client_id: String,
    },

    /// Remote sync connection lost
    RemoteDisconnected,

    /// The aggregation server asked for the full attendance dataset
    AttendanceRequested,
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally, providing non-blocking publish, multiple
/// concurrent subscribers, and automatic cleanup when subscribers drop.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AppEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<AppEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    ///
    /// Used for events where a missing subscriber is acceptable (e.g. the
    /// sync client publishing while no event loop has started yet).
    pub fn emit_lossy(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_to_all_subscribers() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.emit(AppEvent::RemoteDisconnected).unwrap();

        assert!(matches!(a.recv().await, Ok(AppEvent::RemoteDisconnected)));
        assert!(matches!(b.recv().await, Ok(AppEvent::RemoteDisconnected)));
    }

    #[tokio::test]
    async fn emit_lossy_without_subscribers_is_ok() {
        let bus = EventBus::new(8);
        bus.emit_lossy(AppEvent::AttendanceRequested);
    }
}
