//! Repository for the `status_events` table.

use labflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::status_event::{CreateStatusEvent, StatusEvent};

const COLUMNS: &str = "id, entity_table, entity_id, stage, from_status, to_status, action, \
                       actor_user_id, payload, occurred_at";

pub struct StatusEventRepo;

impl StatusEventRepo {
    /// Append an event, returning its id.
    pub async fn create(pool: &PgPool, input: &CreateStatusEvent) -> Result<DbId, sqlx::Error> {
        let row: (DbId,) = sqlx::query_as(
            "INSERT INTO status_events
                (entity_table, entity_id, stage, from_status, to_status, action,
                 actor_user_id, payload, occurred_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id",
        )
        .bind(&input.entity_table)
        .bind(input.entity_id)
        .bind(&input.stage)
        .bind(&input.from_status)
        .bind(&input.to_status)
        .bind(&input.action)
        .bind(input.actor_user_id)
        .bind(&input.payload)
        .bind(input.occurred_at)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// History of one entity, newest first.
    pub async fn list_for_entity(
        pool: &PgPool,
        entity_table: &str,
        entity_id: DbId,
        limit: i64,
    ) -> Result<Vec<StatusEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM status_events
             WHERE entity_table = $1 AND entity_id = $2
             ORDER BY occurred_at DESC, id DESC
             LIMIT $3"
        );
        sqlx::query_as::<_, StatusEvent>(&query)
            .bind(entity_table)
            .bind(entity_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
