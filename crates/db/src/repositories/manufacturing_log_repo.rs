//! Repository for the `manufacturing_logs` table.

use labflow_core::manufacturing::{StageStatus, StageUpdate};
use labflow_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::manufacturing_log::ManufacturingLogRow;

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, lab_script_id, method, \
                          manufacturing_status, manufacturing_started_at, manufacturing_completed_at, manufacturing_hold_at, manufacturing_hold_reason, \
                          sintering_status, sintering_started_at, sintering_completed_at, sintering_hold_at, sintering_hold_reason, \
                          miyo_status, miyo_started_at, miyo_completed_at, miyo_hold_at, miyo_hold_reason, \
                          inspection_status, inspection_started_at, inspection_completed_at, inspection_hold_at, inspection_hold_reason, \
                          created_at, updated_at";

pub struct ManufacturingLogRepo;

impl ManufacturingLogRepo {
    pub async fn find_by_lab_script(
        pool: &PgPool,
        lab_script_id: DbId,
    ) -> Result<Option<ManufacturingLogRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM manufacturing_logs WHERE lab_script_id = $1");
        sqlx::query_as::<_, ManufacturingLogRow>(&query)
            .bind(lab_script_id)
            .fetch_optional(pool)
            .await
    }

    /// Write one stage's columns, but only while that stage still has
    /// `update.expected` and, for a start, the previous stage is still
    /// `completed`. Returns `None` when no row matched.
    pub async fn update_stage_if_status(
        pool: &PgPool,
        log_id: DbId,
        update: &StageUpdate,
        now: Timestamp,
    ) -> Result<Option<ManufacturingLogRow>, sqlx::Error> {
        let query = stage_update_sql(update);
        sqlx::query_as::<_, ManufacturingLogRow>(&query)
            .bind(log_id)
            .bind(update.expected.as_str())
            .bind(update.next.status.as_str())
            .bind(update.next.started_at)
            .bind(update.next.completed_at)
            .bind(update.next.hold_at)
            .bind(&update.next.hold_reason)
            .bind(now)
            .fetch_optional(pool)
            .await
    }
}

/// Build the conditional stage update. Column names come from the closed
/// [`Stage`](labflow_core::manufacturing::Stage) enum, never from input.
fn stage_update_sql(update: &StageUpdate) -> String {
    let p = update.stage.column_prefix();
    let guard = match update.requires_completed {
        Some(prev) => format!(
            " AND {}_status = '{}'",
            prev.column_prefix(),
            StageStatus::Completed.as_str()
        ),
        None => String::new(),
    };
    format!(
        "UPDATE manufacturing_logs SET
            {p}_status = $3,
            {p}_started_at = $4,
            {p}_completed_at = $5,
            {p}_hold_at = $6,
            {p}_hold_reason = $7,
            updated_at = $8
         WHERE id = $1 AND {p}_status = $2{guard}
         RETURNING {COLUMNS}"
    )
}

#[cfg(test)]
mod tests {
    use labflow_core::manufacturing::{Stage, StageState};

    use super::*;

    fn update(stage: Stage, requires_completed: Option<Stage>) -> StageUpdate {
        StageUpdate {
            stage,
            expected: StageStatus::Pending,
            next: StageState {
                status: StageStatus::InProgress,
                ..StageState::pending()
            },
            requires_completed,
        }
    }

    #[test]
    fn start_guards_previous_stage() {
        let sql = stage_update_sql(&update(Stage::Sintering, Some(Stage::Manufacturing)));
        assert!(sql.contains("sintering_status = $3"));
        assert!(sql.contains("WHERE id = $1 AND sintering_status = $2 AND manufacturing_status = 'completed'"));
    }

    #[test]
    fn other_updates_only_guard_own_status() {
        let sql = stage_update_sql(&update(Stage::Miyo, None));
        assert!(sql.contains("WHERE id = $1 AND miyo_status = $2\n"));
        assert!(!sql.contains("sintering_status ="));
    }

    #[test]
    fn column_list_covers_every_stage() {
        for stage in Stage::ALL {
            for suffix in ["status", "started_at", "completed_at", "hold_at", "hold_reason"] {
                let column = format!("{}_{suffix}", stage.column_prefix());
                assert!(COLUMNS.contains(&column), "missing {column}");
            }
        }
    }
}
