//! Persistence seam for the workflow.
//!
//! Status writes are conditional: a `swap_*` call only applies when the row
//! still has the expected status, and reports `None` otherwise. The caller
//! decides what a failed swap means by reading the row again.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::lab_script::{LabScript, LabScriptStatus, NewLabScript};
use crate::manufacturing::{ManufacturingLog, StageUpdate};
use crate::patient::{NewPatient, Patient};
use crate::report_card::{ClinicalInfo, ClinicalInfoInput, DesignInfo, DesignInfoInput};
use crate::types::{DbId, Timestamp, UserId};

/// Filters for listing lab scripts.
#[derive(Debug, Clone, Default)]
pub struct LabScriptFilter {
    pub status: Option<LabScriptStatus>,
    pub patient_id: Option<DbId>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_patient(&self, input: &NewPatient) -> Result<Patient, CoreError>;

    async fn find_patient(&self, id: DbId) -> Result<Option<Patient>, CoreError>;

    async fn list_patients(&self, limit: i64, offset: i64) -> Result<Vec<Patient>, CoreError>;

    /// Insert a `pending` lab script together with its manufacturing log.
    async fn create_lab_script(
        &self,
        input: &NewLabScript,
    ) -> Result<(LabScript, ManufacturingLog), CoreError>;

    async fn find_lab_script(&self, id: DbId) -> Result<Option<LabScript>, CoreError>;

    async fn list_lab_scripts(&self, filter: &LabScriptFilter)
        -> Result<Vec<LabScript>, CoreError>;

    /// Write `next` only if the stored row is still in `expected`.
    async fn swap_lab_script(
        &self,
        expected: LabScriptStatus,
        next: &LabScript,
    ) -> Result<Option<LabScript>, CoreError>;

    async fn find_manufacturing_log(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<ManufacturingLog>, CoreError>;

    /// Apply `update` only if the stage still has `update.expected` and, when
    /// set, `update.requires_completed` is still `completed`.
    async fn swap_stage(
        &self,
        log_id: DbId,
        update: &StageUpdate,
        now: Timestamp,
    ) -> Result<Option<ManufacturingLog>, CoreError>;

    async fn find_design_info(&self, lab_script_id: DbId)
        -> Result<Option<DesignInfo>, CoreError>;

    async fn find_clinical_info(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<ClinicalInfo>, CoreError>;

    /// Upsert design info, only while the lab script is `completed`.
    /// Returns `None` when the gate no longer holds at write time.
    async fn upsert_design_info(
        &self,
        lab_script_id: DbId,
        input: &DesignInfoInput,
        actor: UserId,
    ) -> Result<Option<DesignInfo>, CoreError>;

    /// Upsert clinical info, only while the lab script is `completed`.
    async fn upsert_clinical_info(
        &self,
        lab_script_id: DbId,
        input: &ClinicalInfoInput,
        actor: UserId,
    ) -> Result<Option<ClinicalInfo>, CoreError>;
}
