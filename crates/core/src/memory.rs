//! In-process [`WorkflowStore`] used by tests and local development.
//!
//! Every operation takes one lock, so conditional writes are atomic in the
//! same way a single-row `UPDATE ... WHERE status = $expected` is.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::lab_script::{LabScript, LabScriptStatus, NewLabScript};
use crate::manufacturing::{ManufacturingLog, StageState, StageStatus, StageUpdate};
use crate::patient::{NewPatient, Patient};
use crate::report_card::{ClinicalInfo, ClinicalInfoInput, DesignInfo, DesignInfoInput};
use crate::store::{LabScriptFilter, WorkflowStore};
use crate::types::{DbId, Timestamp, UserId};

#[derive(Debug, Default)]
struct Tables {
    next_id: DbId,
    patients: BTreeMap<DbId, Patient>,
    lab_scripts: BTreeMap<DbId, LabScript>,
    /// Keyed by lab script id.
    logs: BTreeMap<DbId, ManufacturingLog>,
    design: BTreeMap<DbId, DesignInfo>,
    clinical: BTreeMap<DbId, ClinicalInfo>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn lab_script_completed(&self, id: DbId) -> bool {
        self.lab_scripts
            .get(&id)
            .is_some_and(|s| s.status == LabScriptStatus::Completed)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a stored lab script unconditionally, bypassing the workflow.
    pub async fn overwrite_lab_script(&self, script: LabScript) {
        self.tables.lock().await.lab_scripts.insert(script.id, script);
    }

    /// Remove a lab script and everything attached to it.
    pub async fn delete_lab_script(&self, id: DbId) -> bool {
        let mut t = self.tables.lock().await;
        t.logs.remove(&id);
        t.design.remove(&id);
        t.clinical.remove(&id);
        t.lab_scripts.remove(&id).is_some()
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, limit: i64, offset: i64) -> Vec<T> {
    let limit = if limit <= 0 { usize::MAX } else { limit as usize };
    items.skip(offset.max(0) as usize).take(limit).collect()
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn create_patient(&self, input: &NewPatient) -> Result<Patient, CoreError> {
        let mut t = self.tables.lock().await;
        let patient = Patient {
            id: t.next_id(),
            first_name: input.first_name.trim().to_string(),
            last_name: input.last_name.trim().to_string(),
            date_of_birth: input.date_of_birth,
            phone: input.phone.clone(),
            email: input.email.clone(),
            created_at: Utc::now(),
        };
        t.patients.insert(patient.id, patient.clone());
        Ok(patient)
    }

    async fn find_patient(&self, id: DbId) -> Result<Option<Patient>, CoreError> {
        Ok(self.tables.lock().await.patients.get(&id).cloned())
    }

    async fn list_patients(&self, limit: i64, offset: i64) -> Result<Vec<Patient>, CoreError> {
        let t = self.tables.lock().await;
        Ok(page(t.patients.values().cloned(), limit, offset))
    }

    async fn create_lab_script(
        &self,
        input: &NewLabScript,
    ) -> Result<(LabScript, ManufacturingLog), CoreError> {
        let mut t = self.tables.lock().await;
        if !t.patients.contains_key(&input.patient_id) {
            return Err(CoreError::NotFound {
                entity: "Patient",
                id: input.patient_id,
            });
        }
        let now = Utc::now();
        let script = LabScript {
            id: t.next_id(),
            patient_id: input.patient_id,
            doctor_name: input.doctor_name.trim().to_string(),
            clinic_name: input.clinic_name.clone(),
            appliance_type: input.appliance_type.trim().to_string(),
            arch: input.arch,
            due_date: input.due_date,
            notes: input.notes.clone(),
            status: LabScriptStatus::Pending,
            hold_reason: None,
            status_changed_at: None,
            status_changed_by: None,
            status_notes: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        let log = ManufacturingLog {
            id: t.next_id(),
            lab_script_id: script.id,
            method: input.manufacturing_method,
            manufacturing: StageState::pending(),
            sintering: StageState::pending(),
            miyo: StageState::pending(),
            inspection: StageState::pending(),
            created_at: now,
            updated_at: now,
        };
        t.lab_scripts.insert(script.id, script.clone());
        t.logs.insert(script.id, log.clone());
        Ok((script, log))
    }

    async fn find_lab_script(&self, id: DbId) -> Result<Option<LabScript>, CoreError> {
        Ok(self.tables.lock().await.lab_scripts.get(&id).cloned())
    }

    async fn list_lab_scripts(
        &self,
        filter: &LabScriptFilter,
    ) -> Result<Vec<LabScript>, CoreError> {
        let t = self.tables.lock().await;
        let matching = t
            .lab_scripts
            .values()
            .rev()
            .filter(|s| filter.status.map_or(true, |st| s.status == st))
            .filter(|s| filter.patient_id.map_or(true, |p| s.patient_id == p))
            .cloned();
        Ok(page(matching, filter.limit, filter.offset))
    }

    async fn swap_lab_script(
        &self,
        expected: LabScriptStatus,
        next: &LabScript,
    ) -> Result<Option<LabScript>, CoreError> {
        let mut t = self.tables.lock().await;
        match t.lab_scripts.get_mut(&next.id) {
            Some(row) if row.status == expected => {
                *row = next.clone();
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_manufacturing_log(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<ManufacturingLog>, CoreError> {
        Ok(self.tables.lock().await.logs.get(&lab_script_id).cloned())
    }

    async fn swap_stage(
        &self,
        log_id: DbId,
        update: &StageUpdate,
        now: Timestamp,
    ) -> Result<Option<ManufacturingLog>, CoreError> {
        let mut t = self.tables.lock().await;
        let Some(log) = t.logs.values_mut().find(|l| l.id == log_id) else {
            return Ok(None);
        };
        if log.stage(update.stage).status != update.expected {
            return Ok(None);
        }
        if let Some(prev) = update.requires_completed {
            if log.stage(prev).status != StageStatus::Completed {
                return Ok(None);
            }
        }
        *log.stage_mut(update.stage) = update.next.clone();
        log.updated_at = now;
        Ok(Some(log.clone()))
    }

    async fn find_design_info(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<DesignInfo>, CoreError> {
        Ok(self.tables.lock().await.design.get(&lab_script_id).cloned())
    }

    async fn find_clinical_info(
        &self,
        lab_script_id: DbId,
    ) -> Result<Option<ClinicalInfo>, CoreError> {
        Ok(self.tables.lock().await.clinical.get(&lab_script_id).cloned())
    }

    async fn upsert_design_info(
        &self,
        lab_script_id: DbId,
        input: &DesignInfoInput,
        actor: UserId,
    ) -> Result<Option<DesignInfo>, CoreError> {
        let mut t = self.tables.lock().await;
        if !t.lab_script_completed(lab_script_id) {
            return Ok(None);
        }
        let now = Utc::now();
        let existing = t.design.get(&lab_script_id).map(|e| (e.id, e.created_at));
        let (id, created_at) = match existing {
            Some(found) => found,
            None => (t.next_id(), now),
        };
        let info = DesignInfo {
            id,
            lab_script_id,
            designer_name: input.designer_name.clone(),
            design_software: input.design_software.clone(),
            design_link: input.design_link.clone(),
            notes: input.notes.clone(),
            updated_by: actor,
            created_at,
            updated_at: now,
        };
        t.design.insert(lab_script_id, info.clone());
        Ok(Some(info))
    }

    async fn upsert_clinical_info(
        &self,
        lab_script_id: DbId,
        input: &ClinicalInfoInput,
        actor: UserId,
    ) -> Result<Option<ClinicalInfo>, CoreError> {
        let mut t = self.tables.lock().await;
        if !t.lab_script_completed(lab_script_id) {
            return Ok(None);
        }
        let now = Utc::now();
        let existing = t.clinical.get(&lab_script_id).map(|e| (e.id, e.created_at));
        let (id, created_at) = match existing {
            Some(found) => found,
            None => (t.next_id(), now),
        };
        let info = ClinicalInfo {
            id,
            lab_script_id,
            delivery_date: input.delivery_date,
            fit_assessment: input.fit_assessment.clone(),
            occlusion_notes: input.occlusion_notes.clone(),
            patient_feedback: input.patient_feedback.clone(),
            notes: input.notes.clone(),
            updated_by: actor,
            created_at,
            updated_at: now,
        };
        t.clinical.insert(lab_script_id, info.clone());
        Ok(Some(info))
    }
}
