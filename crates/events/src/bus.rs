//! In-process change bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`ChangeEvent`]s. Handlers
//! publish after a write is committed; the WebSocket change feed and the
//! status history recorder subscribe. Share it via `Arc<EventBus>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use labflow_core::types::{DbId, UserId};

// ---------------------------------------------------------------------------
// Table names
// ---------------------------------------------------------------------------

pub const TABLE_PATIENTS: &str = "patients";
pub const TABLE_LAB_SCRIPTS: &str = "lab_scripts";
pub const TABLE_MANUFACTURING_LOGS: &str = "manufacturing_logs";
pub const TABLE_DESIGN_INFO: &str = "design_info";
pub const TABLE_CLINICAL_INFO: &str = "clinical_info";

/// Tables a change feed may subscribe to.
pub const WATCHABLE_TABLES: &[&str] = &[
    TABLE_PATIENTS,
    TABLE_LAB_SCRIPTS,
    TABLE_MANUFACTURING_LOGS,
    TABLE_DESIGN_INFO,
    TABLE_CLINICAL_INFO,
];

// ---------------------------------------------------------------------------
// ChangeEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    StatusChanged,
}

/// Details of an applied status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Manufacturing stage, for stage transitions.
    pub stage: Option<String>,
    pub from: String,
    pub to: String,
    pub action: String,
}

/// A committed change to one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub row_id: DbId,
    pub event_type: ChangeKind,
    pub status_change: Option<StatusChange>,
    pub actor_user_id: Option<UserId>,
    /// The row as it is after the change.
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, row_id: DbId, event_type: ChangeKind) -> Self {
        Self {
            table: table.into(),
            row_id,
            event_type,
            status_change: None,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn created(table: impl Into<String>, row_id: DbId) -> Self {
        Self::new(table, row_id, ChangeKind::Created)
    }

    pub fn updated(table: impl Into<String>, row_id: DbId) -> Self {
        Self::new(table, row_id, ChangeKind::Updated)
    }

    pub fn status_changed(table: impl Into<String>, row_id: DbId, change: StatusChange) -> Self {
        let mut event = Self::new(table, row_id, ChangeKind::StatusChanged);
        event.status_change = Some(change);
        event
    }

    pub fn with_actor(mut self, user_id: UserId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    /// Attach the changed row. Serialization failures leave the payload empty.
    pub fn with_row<T: Serialize>(mut self, row: &T) -> Self {
        match serde_json::to_value(row) {
            Ok(value) => self.payload = value,
            Err(e) => tracing::warn!(error = %e, table = %self.table, "Failed to serialize change payload"),
        }
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out bus.
///
/// When the buffer is full the oldest un-consumed events are dropped and
/// slow receivers observe `RecvError::Lagged`.
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all current subscribers. Dropped silently when nobody
    /// is listening.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
