//! Status history recorder.
//!
//! [`StatusHistoryRecorder`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and appends every `status_changed` event to the `status_events` table.
//! Other change kinds are ignored. It runs as a background task and exits
//! when the bus is dropped.

use labflow_core::types::DbId;
use labflow_db::models::status_event::CreateStatusEvent;
use labflow_db::repositories::StatusEventRepo;
use labflow_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::{ChangeEvent, ChangeKind};

pub struct StatusHistoryRecorder;

impl StatusHistoryRecorder {
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<ChangeEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let Some(record) = history_record(&event) else {
                        continue;
                    };
                    if let Err(e) = Self::persist(&pool, &record).await {
                        tracing::error!(
                            error = %e,
                            table = %record.entity_table,
                            entity_id = record.entity_id,
                            "Failed to record status change"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Status history lagged, some transitions were not recorded"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, status history shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, record: &CreateStatusEvent) -> Result<DbId, sqlx::Error> {
        StatusEventRepo::create(pool, record).await
    }
}

/// Map a change event to a history row. `None` for anything that is not
/// a status transition.
pub fn history_record(event: &ChangeEvent) -> Option<CreateStatusEvent> {
    if event.event_type != ChangeKind::StatusChanged {
        return None;
    }
    let change = event.status_change.as_ref()?;
    Some(CreateStatusEvent {
        entity_table: event.table.clone(),
        entity_id: event.row_id,
        stage: change.stage.clone(),
        from_status: Some(change.from.clone()),
        to_status: change.to.clone(),
        action: change.action.clone(),
        actor_user_id: event.actor_user_id,
        payload: event.payload.clone(),
        occurred_at: event.timestamp,
    })
}
