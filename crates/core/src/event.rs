//! Domain event system: decoupled notification of session transitions.
//!
//! The orchestrator publishes an event whenever a session changes state.
//! Other components (logging, analytics sinks) subscribe without coupling
//! to the orchestrator.

use crate::level::Level;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DiagnosticEvent {
    /// A new session was created
    SessionStarted {
        student_id: String,
        session_id: String,
        first_item_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A response was scored and theta re-estimated
    ResponseRecorded {
        student_id: String,
        session_id: String,
        item_id: String,
        is_correct: bool,
        theta_after: f64,
        items_administered: usize,
        timestamp: DateTime<Utc>,
    },

    /// The session was finalized and a result created
    SessionCompleted {
        student_id: String,
        session_id: String,
        overall_level: Level,
        theta_final: f64,
        timestamp: DateTime<Utc>,
    },

    /// An in-progress session was discarded by an administrator
    SessionReset {
        student_id: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for diagnostic events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DiagnosticEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DiagnosticEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DiagnosticEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
