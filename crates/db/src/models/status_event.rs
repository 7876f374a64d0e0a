//! Status history rows.

use labflow_core::types::{DbId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `status_events` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusEvent {
    pub id: DbId,
    pub entity_table: String,
    pub entity_id: DbId,
    pub stage: Option<String>,
    pub from_status: Option<String>,
    pub to_status: String,
    pub action: String,
    pub actor_user_id: Option<UserId>,
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
}

/// DTO for appending a status event.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateStatusEvent {
    pub entity_table: String,
    pub entity_id: DbId,
    pub stage: Option<String>,
    pub from_status: Option<String>,
    pub to_status: String,
    pub action: String,
    pub actor_user_id: Option<UserId>,
    pub payload: serde_json::Value,
    pub occurred_at: Timestamp,
}
