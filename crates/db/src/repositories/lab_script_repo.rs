//! Repository for the `lab_scripts` table.

use labflow_core::lab_script::{LabScript, LabScriptStatus, NewLabScript};
use labflow_core::store::LabScriptFilter;
use labflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::lab_script::{hold_columns, LabScriptRow};
use crate::models::manufacturing_log::ManufacturingLogRow;
use crate::repositories::manufacturing_log_repo::COLUMNS as LOG_COLUMNS;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, patient_id, doctor_name, clinic_name, appliance_type, arch, \
                       due_date, notes, status, hold_reason, hold_details, \
                       status_changed_at, status_changed_by, status_notes, completed_at, \
                       created_at, updated_at";

pub struct LabScriptRepo;

impl LabScriptRepo {
    /// Insert a `pending` lab script and its manufacturing log in one
    /// transaction.
    pub async fn create_with_log(
        pool: &PgPool,
        input: &NewLabScript,
    ) -> Result<(LabScriptRow, ManufacturingLogRow), sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO lab_scripts
                (patient_id, doctor_name, clinic_name, appliance_type, arch, due_date, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        let script = sqlx::query_as::<_, LabScriptRow>(&query)
            .bind(input.patient_id)
            .bind(input.doctor_name.trim())
            .bind(&input.clinic_name)
            .bind(input.appliance_type.trim())
            .bind(input.arch.as_str())
            .bind(input.due_date)
            .bind(&input.notes)
            .fetch_one(&mut *tx)
            .await?;

        let query = format!(
            "INSERT INTO manufacturing_logs (lab_script_id, method)
             VALUES ($1, $2)
             RETURNING {LOG_COLUMNS}"
        );
        let log = sqlx::query_as::<_, ManufacturingLogRow>(&query)
            .bind(script.id)
            .bind(input.manufacturing_method.map(|m| m.as_str()))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((script, log))
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<LabScriptRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM lab_scripts WHERE id = $1");
        sqlx::query_as::<_, LabScriptRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List lab scripts, newest first, optionally filtered by status and patient.
    pub async fn list(
        pool: &PgPool,
        filter: &LabScriptFilter,
    ) -> Result<Vec<LabScriptRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lab_scripts
             WHERE ($1::TEXT IS NULL OR status = $1)
               AND ($2::BIGINT IS NULL OR patient_id = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, LabScriptRow>(&query)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.patient_id)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(pool)
            .await
    }

    /// Write every workflow column of `next`, but only while the stored
    /// status is still `expected`. Returns `None` when no row matched.
    pub async fn update_if_status(
        pool: &PgPool,
        expected: LabScriptStatus,
        next: &LabScript,
    ) -> Result<Option<LabScriptRow>, sqlx::Error> {
        let (hold_reason, hold_details) = hold_columns(next.hold_reason.as_ref());
        let query = format!(
            "UPDATE lab_scripts SET
                status = $3,
                hold_reason = $4,
                hold_details = $5,
                status_changed_at = $6,
                status_changed_by = $7,
                status_notes = $8,
                completed_at = $9,
                updated_at = $10
             WHERE id = $1 AND status = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LabScriptRow>(&query)
            .bind(next.id)
            .bind(expected.as_str())
            .bind(next.status.as_str())
            .bind(hold_reason)
            .bind(hold_details)
            .bind(next.status_changed_at)
            .bind(next.status_changed_by)
            .bind(&next.status_notes)
            .bind(next.completed_at)
            .bind(next.updated_at)
            .fetch_optional(pool)
            .await
    }
}
