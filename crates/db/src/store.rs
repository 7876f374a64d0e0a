//! PostgreSQL implementation of [`WorkflowStore`].

use async_trait::async_trait;
use labflow_core::error::CoreError;
use labflow_core::lab_script::{LabScript, LabScriptStatus, NewLabScript};
use labflow_core::manufacturing::{ManufacturingLog, StageUpdate};
use labflow_core::patient::{NewPatient, Patient};
use labflow_core::report_card::{ClinicalInfo, ClinicalInfoInput, DesignInfo, DesignInfoInput};
use labflow_core::store::{LabScriptFilter, WorkflowStore};
use labflow_core::types::{DbId, Timestamp, UserId};

use crate::repositories::{LabScriptRepo, ManufacturingLogRepo, PatientRepo, ReportCardRepo};
use crate::DbPool;

/// Default page size when a list filter leaves `limit` unset.
const DEFAULT_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: DbPool,
}

impl PgWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Convert a database error into the domain's persistence failure.
///
/// The full error is logged; the returned message stays generic.
fn persistence(err: sqlx::Error) -> CoreError {
    tracing::error!(error = %err, "Database error");
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            CoreError::Persistence("The database is currently unavailable".to_string())
        }
        _ => CoreError::Persistence("A database error occurred".to_string()),
    }
}

fn limit_or_default(limit: i64) -> i64 {
    if limit <= 0 {
        DEFAULT_LIMIT
    } else {
        limit
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn create_patient(&self, input: &NewPatient) -> Result<Patient, CoreError> {
        let row = PatientRepo::create(&self.pool, input)
            .await
            .map_err(persistence)?;
        Ok(row.into())
    }

    async fn find_patient(&self, id: DbId) -> Result<Option<Patient>, CoreError> {
        let row = PatientRepo::find_by_id(&self.pool, id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn list_patients(&self, limit: i64, offset: i64) -> Result<Vec<Patient>, CoreError> {
        let rows = PatientRepo::list(&self.pool, limit_or_default(limit), offset.max(0))
            .await
            .map_err(persistence)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_lab_script(
        &self,
        input: &NewLabScript,
    ) -> Result<(LabScript, ManufacturingLog), CoreError> {
        let (script, log) = LabScriptRepo::create_with_log(&self.pool, input)
            .await
            .map_err(persistence)?;
        Ok((LabScript::try_from(script)?, ManufacturingLog::try_from(log)?))
    }

    async fn find_lab_script(&self, id: DbId) -> Result<Option<LabScript>, CoreError> {
        LabScriptRepo::find_by_id(&self.pool, id)
            .await
            .map_err(persistence)?
            .map(LabScript::try_from)
            .transpose()
    }

    async fn list_lab_scripts(
        &self,
        filter: &LabScriptFilter,
    ) -> Result<Vec<LabScript>, CoreError> {
        let filter = LabScriptFilter {
            limit: limit_or_default(filter.limit),
            offset: filter.offset.max(0),
            ..filter.clone()
        };
        LabScriptRepo::list(&self.pool, &filter)
            .await
            .map_err(persistence)?
            .into_iter()
            .map(LabScript::try_from)
            .collect()
    }

    async fn swap_lab_script(
        &self,
        expected: LabScriptStatus,
        next: &LabScript,
    ) -> Result<Option<LabScript>, CoreError> {
        LabScriptRepo::update_if_status(&self.pool, expected, next)
            .await
            .map_err(persistence)?
            .map(LabScript::try_from)
            .transpose()
    }

    async fn find_manufacturing_log(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<ManufacturingLog>, CoreError> {
        ManufacturingLogRepo::find_by_lab_script(&self.pool, lab_script_id)
            .await
            .map_err(persistence)?
            .map(ManufacturingLog::try_from)
            .transpose()
    }

    async fn swap_stage(
        &self,
        log_id: DbId,
        update: &StageUpdate,
        now: Timestamp,
    ) -> Result<Option<ManufacturingLog>, CoreError> {
        ManufacturingLogRepo::update_stage_if_status(&self.pool, log_id, update, now)
            .await
            .map_err(persistence)?
            .map(ManufacturingLog::try_from)
            .transpose()
    }

    async fn find_design_info(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<DesignInfo>, CoreError> {
        let row = ReportCardRepo::find_design_info(&self.pool, lab_script_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn find_clinical_info(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<ClinicalInfo>, CoreError> {
        let row = ReportCardRepo::find_clinical_info(&self.pool, lab_script_id)
            .await
            .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn upsert_design_info(
        &self,
        lab_script_id: DbId,
        input: &DesignInfoInput,
        actor: UserId,
    ) -> Result<Option<DesignInfo>, CoreError> {
        let row =
            ReportCardRepo::upsert_design_info_if_completed(&self.pool, lab_script_id, input, actor)
                .await
                .map_err(persistence)?;
        Ok(row.map(Into::into))
    }

    async fn upsert_clinical_info(
        &self,
        lab_script_id: DbId,
        input: &ClinicalInfoInput,
        actor: UserId,
    ) -> Result<Option<ClinicalInfo>, CoreError> {
        let row = ReportCardRepo::upsert_clinical_info_if_completed(
            &self.pool,
            lab_script_id,
            input,
            actor,
        )
        .await
        .map_err(persistence)?;
        Ok(row.map(Into::into))
    }
}
