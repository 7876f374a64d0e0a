//! Workflow operations over an injected [`WorkflowStore`].
//!
//! Each transition validates its command, reads the record, plans the change
//! with the state machine and then writes it conditionally. When the write
//! does not apply the record is read once more to tell a deleted row, an
//! idempotent race and a real conflict apart. Nothing is retried.

use std::sync::Arc;

use chrono::Utc;

use crate::error::CoreError;
use crate::lab_script::{
    plan_transition, LabScript, LabScriptCommand, LabScriptStatus, NewLabScript,
    LAB_SCRIPT_MACHINE,
};
use crate::manufacturing::{
    plan_stage_transition, ManufacturingLog, Stage, StageCommand, StageStatus,
};
use crate::patient::{NewPatient, Patient};
use crate::report_card::{
    ensure_lab_script_completed, ClinicalInfo, ClinicalInfoInput, DesignInfo, DesignInfoInput,
    InfoKind, ReportCard,
};
use crate::roles::{LAB_ROLES, VALID_ROLES};
use crate::session::Session;
use crate::store::{LabScriptFilter, WorkflowStore};
use crate::types::DbId;
use crate::workflow::{Plan, WorkflowAction};

/// Result of a transition request.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T, S> {
    /// The write applied and moved the record from `from` to `to`.
    Applied { record: T, from: S, to: S },
    /// Idempotent re-application; the stored record is returned as is.
    Unchanged { record: T },
}

impl<T, S> Transition<T, S> {
    pub fn record(&self) -> &T {
        match self {
            Transition::Applied { record, .. } | Transition::Unchanged { record } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            Transition::Applied { record, .. } | Transition::Unchanged { record } => record,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }
}

#[derive(Clone)]
pub struct WorkflowEngine {
    store: Arc<dyn WorkflowStore>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    /* ----------------------------------------------------------------------
    Patients and lab scripts
    ---------------------------------------------------------------------- */

    pub async fn create_patient(
        &self,
        session: &Session,
        input: &NewPatient,
    ) -> Result<Patient, CoreError> {
        session.require_any_role(VALID_ROLES, "create patients")?;
        input.validate()?;
        let patient = self.store.create_patient(input).await?;
        tracing::info!(patient_id = patient.id, user_id = %session.user_id, "Patient created");
        Ok(patient)
    }

    pub async fn patient(&self, id: DbId) -> Result<Patient, CoreError> {
        self.store
            .find_patient(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Patient",
                id,
            })
    }

    pub async fn list_patients(&self, limit: i64, offset: i64) -> Result<Vec<Patient>, CoreError> {
        self.store.list_patients(limit, offset).await
    }

    pub async fn create_lab_script(
        &self,
        session: &Session,
        input: &NewLabScript,
    ) -> Result<(LabScript, ManufacturingLog), CoreError> {
        session.require_any_role(VALID_ROLES, "create lab scripts")?;
        input.validate()?;
        self.patient(input.patient_id).await?;

        let (script, log) = self.store.create_lab_script(input).await?;
        tracing::info!(
            lab_script_id = script.id,
            manufacturing_log_id = log.id,
            user_id = %session.user_id,
            "Lab script created"
        );
        Ok((script, log))
    }

    pub async fn lab_script(&self, id: DbId) -> Result<LabScript, CoreError> {
        self.store
            .find_lab_script(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "LabScript",
                id,
            })
    }

    pub async fn list_lab_scripts(
        &self,
        filter: &LabScriptFilter,
    ) -> Result<Vec<LabScript>, CoreError> {
        self.store.list_lab_scripts(filter).await
    }

    /// Apply a lab script transition on behalf of `session`.
    pub async fn transition_lab_script(
        &self,
        session: &Session,
        id: DbId,
        command: &LabScriptCommand,
        notes: Option<&str>,
    ) -> Result<Transition<LabScript, LabScriptStatus>, CoreError> {
        let action = command.action();
        session.require_any_role(action.required_roles(), &format!("{action} lab scripts"))?;

        let current = self.lab_script(id).await?;
        let next = match plan_transition(&current, command, session.user_id, notes, Utc::now())? {
            Plan::Unchanged => {
                tracing::debug!(lab_script_id = id, action = %action, "Lab script transition is a no-op");
                return Ok(Transition::Unchanged { record: current });
            }
            Plan::Apply(next) => next,
        };

        if let Some(stored) = self.store.swap_lab_script(current.status, &next).await? {
            tracing::info!(
                lab_script_id = id,
                action = %action,
                from = %current.status,
                to = %stored.status,
                user_id = %session.user_id,
                "Lab script status changed"
            );
            return Ok(Transition::Applied {
                from: current.status,
                to: stored.status,
                record: stored,
            });
        }

        // The row moved between the read and the write.
        let latest = self.lab_script(id).await?;
        if action.is_idempotent() && LAB_SCRIPT_MACHINE.is_target_of(latest.status, action) {
            tracing::debug!(lab_script_id = id, action = %action, "Concurrent transition already applied");
            return Ok(Transition::Unchanged { record: latest });
        }
        tracing::warn!(
            lab_script_id = id,
            action = %action,
            expected = %current.status,
            actual = %latest.status,
            "Lab script changed concurrently"
        );
        Err(CoreError::Conflict(format!(
            "Lab script {id} changed from '{}' to '{}' while '{action}' was being applied; reload and try again",
            current.status, latest.status
        )))
    }

    /* ----------------------------------------------------------------------
    Manufacturing
    ---------------------------------------------------------------------- */

    pub async fn manufacturing_log(&self, lab_script_id: DbId) -> Result<ManufacturingLog, CoreError> {
        self.store
            .find_manufacturing_log(lab_script_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ManufacturingLog",
                id: lab_script_id,
            })
    }

    /// Apply a transition to one stage of a lab script's manufacturing log.
    pub async fn transition_stage(
        &self,
        session: &Session,
        lab_script_id: DbId,
        stage: Stage,
        command: &StageCommand,
    ) -> Result<Transition<ManufacturingLog, StageStatus>, CoreError> {
        let action = command.action();
        session.require_any_role(LAB_ROLES, &format!("{action} manufacturing stages"))?;

        let log = self.manufacturing_log(lab_script_id).await?;
        let update = match plan_stage_transition(&log, stage, command, Utc::now())? {
            Plan::Unchanged => return Ok(Transition::Unchanged { record: log }),
            Plan::Apply(update) => update,
        };

        if let Some(stored) = self.store.swap_stage(log.id, &update, Utc::now()).await? {
            tracing::info!(
                lab_script_id,
                stage = %stage,
                action = %action,
                from = %update.expected,
                to = %update.next.status,
                user_id = %session.user_id,
                "Manufacturing stage status changed"
            );
            return Ok(Transition::Applied {
                from: update.expected,
                to: update.next.status,
                record: stored,
            });
        }

        let latest = self.manufacturing_log(lab_script_id).await?;
        let now_status = latest.stage(stage).status;
        if action.is_idempotent() && stage.machine().is_target_of(now_status, action) {
            return Ok(Transition::Unchanged { record: latest });
        }
        if let Some(prev) = update.requires_completed {
            let prev_status = latest.stage(prev).status;
            if prev_status != StageStatus::Completed {
                return Err(CoreError::PreconditionFailed(format!(
                    "Cannot start {} until {} is completed (currently '{prev_status}')",
                    stage.label(),
                    prev.label(),
                )));
            }
        }
        tracing::warn!(
            lab_script_id,
            stage = %stage,
            action = %action,
            expected = %update.expected,
            actual = %now_status,
            "Manufacturing stage changed concurrently"
        );
        Err(CoreError::Conflict(format!(
            "{} stage of lab script {lab_script_id} changed from '{}' to '{now_status}' while '{action}' was being applied; reload and try again",
            stage.label(),
            update.expected,
        )))
    }

    /* ----------------------------------------------------------------------
    Report cards
    ---------------------------------------------------------------------- */

    pub async fn report_card(&self, lab_script_id: DbId) -> Result<ReportCard, CoreError> {
        self.lab_script(lab_script_id).await?;
        let design = self.store.find_design_info(lab_script_id).await?;
        let clinical = self.store.find_clinical_info(lab_script_id).await?;
        Ok(ReportCard::new(lab_script_id, design, clinical))
    }

    /// Check that `session` may open the `kind` editor for a lab script.
    ///
    /// Always reads the lab script from the store.
    pub async fn open_info_editor(
        &self,
        session: &Session,
        lab_script_id: DbId,
        kind: InfoKind,
    ) -> Result<ReportCard, CoreError> {
        session.require_any_role(
            kind.required_roles(),
            &format!("edit {} information", kind.label()),
        )?;
        let script = self.lab_script(lab_script_id).await?;
        ensure_lab_script_completed(&script, kind)?;
        self.report_card(lab_script_id).await
    }

    pub async fn save_design_info(
        &self,
        session: &Session,
        lab_script_id: DbId,
        input: &DesignInfoInput,
    ) -> Result<DesignInfo, CoreError> {
        input.validate()?;
        self.open_info_editor(session, lab_script_id, InfoKind::Design)
            .await?;
        match self
            .store
            .upsert_design_info(lab_script_id, input, session.user_id)
            .await?
        {
            Some(info) => {
                tracing::info!(lab_script_id, user_id = %session.user_id, "Design info saved");
                Ok(info)
            }
            None => Err(self.gate_error(lab_script_id, InfoKind::Design).await),
        }
    }

    pub async fn save_clinical_info(
        &self,
        session: &Session,
        lab_script_id: DbId,
        input: &ClinicalInfoInput,
    ) -> Result<ClinicalInfo, CoreError> {
        input.validate()?;
        self.open_info_editor(session, lab_script_id, InfoKind::Clinical)
            .await?;
        match self
            .store
            .upsert_clinical_info(lab_script_id, input, session.user_id)
            .await?
        {
            Some(info) => {
                tracing::info!(lab_script_id, user_id = %session.user_id, "Clinical info saved");
                Ok(info)
            }
            None => Err(self.gate_error(lab_script_id, InfoKind::Clinical).await),
        }
    }

    /// Explain why a gated write did not apply.
    async fn gate_error(&self, lab_script_id: DbId, kind: InfoKind) -> CoreError {
        match self.lab_script(lab_script_id).await {
            Ok(script) => match ensure_lab_script_completed(&script, kind) {
                Err(err) => err,
                Ok(()) => CoreError::Conflict(format!(
                    "Lab script {lab_script_id} changed while {} information was being saved",
                    kind.label()
                )),
            },
            Err(err) => err,
        }
    }
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;

    use super::*;
    use crate::hold::HoldReason;
    use crate::lab_script::Arch;
    use crate::manufacturing::StageUpdate;
    use crate::memory::InMemoryStore;
    use crate::roles::{ROLE_ADMIN, ROLE_CLINICIAN, ROLE_TECHNICIAN};
    use crate::types::{Timestamp, UserId};

    fn tech() -> Session {
        Session::new(UserId::from_u128(10), ROLE_TECHNICIAN)
    }

    fn admin() -> Session {
        Session::new(UserId::from_u128(1), ROLE_ADMIN)
    }

    fn clinician() -> Session {
        Session::new(UserId::from_u128(20), ROLE_CLINICIAN)
    }

    async fn setup() -> (WorkflowEngine, Arc<InMemoryStore>, LabScript) {
        let store = Arc::new(InMemoryStore::new());
        let engine = WorkflowEngine::new(store.clone());
        let patient = engine
            .create_patient(
                &tech(),
                &NewPatient {
                    first_name: "Lena".into(),
                    last_name: "Hart".into(),
                    date_of_birth: None,
                    phone: None,
                    email: None,
                },
            )
            .await
            .unwrap();
        let (script, _) = engine
            .create_lab_script(
                &tech(),
                &NewLabScript {
                    patient_id: patient.id,
                    doctor_name: "Dr. Okafor".into(),
                    clinic_name: None,
                    appliance_type: "Zirconia bridge".into(),
                    arch: Arch::Upper,
                    due_date: None,
                    notes: None,
                    manufacturing_method: None,
                },
            )
            .await
            .unwrap();
        (engine, store, script)
    }

    async fn drive(engine: &WorkflowEngine, id: DbId, command: LabScriptCommand) -> LabScript {
        engine
            .transition_lab_script(&tech(), id, &command, None)
            .await
            .unwrap()
            .into_record()
    }

    #[tokio::test]
    async fn scenario_a_start_hold_resume() {
        let (engine, _, script) = setup().await;
        assert_eq!(script.status, LabScriptStatus::Pending);

        let started = drive(&engine, script.id, LabScriptCommand::Start).await;
        assert_eq!(started.status, LabScriptStatus::InProgress);

        let reason = HoldReason::parse("Hold for Insufficient Data: need x-ray", None).unwrap();
        let held = drive(&engine, script.id, LabScriptCommand::Hold(reason)).await;
        assert_eq!(held.status, LabScriptStatus::Hold);
        assert_eq!(
            held.hold_reason.map(|r| r.to_string()).as_deref(),
            Some("Hold for Insufficient Data: need x-ray")
        );

        let resumed = drive(&engine, script.id, LabScriptCommand::Resume).await;
        assert_eq!(resumed.status, LabScriptStatus::InProgress);
        assert!(resumed.hold_reason.is_none());
    }

    #[tokio::test]
    async fn scenario_b_design_editor_rejected_for_pending_script() {
        let (engine, store, script) = setup().await;
        let err = engine
            .open_info_editor(&tech(), script.id, InfoKind::Design)
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Lab script must be completed before adding design information"));

        let err = engine
            .save_design_info(&tech(), script.id, &DesignInfoInput::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::LabScriptIncomplete { .. });
        assert!(store.find_design_info(script.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scenario_c_sintering_waits_for_manufacturing() {
        let (engine, _, script) = setup().await;
        let id = script.id;
        engine
            .transition_stage(&tech(), id, Stage::Manufacturing, &StageCommand::Start)
            .await
            .unwrap();

        let err = engine
            .transition_stage(&tech(), id, Stage::Sintering, &StageCommand::Start)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::PreconditionFailed(_));

        engine
            .transition_stage(&tech(), id, Stage::Manufacturing, &StageCommand::Complete)
            .await
            .unwrap();
        let outcome = engine
            .transition_stage(&tech(), id, Stage::Sintering, &StageCommand::Start)
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(outcome.record().sintering.status, StageStatus::InProgress);
    }

    #[tokio::test]
    async fn scenario_d_concurrent_completes_apply_once() {
        let (engine, _, script) = setup().await;
        drive(&engine, script.id, LabScriptCommand::Start).await;

        let id = script.id;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .transition_lab_script(&tech(), id, &LabScriptCommand::Complete, None)
                    .await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if outcome.is_applied() {
                applied += 1;
            }
            assert_eq!(outcome.record().status, LabScriptStatus::Completed);
        }
        assert_eq!(applied, 1);

        let stored = engine.lab_script(script.id).await.unwrap();
        stored.check_invariants().unwrap();
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn invalid_transition_leaves_state_untouched() {
        let (engine, _, script) = setup().await;
        let err = engine
            .transition_lab_script(&tech(), script.id, &LabScriptCommand::Complete, None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { .. });
        assert_eq!(engine.lab_script(script.id).await.unwrap(), script);
    }

    #[tokio::test]
    async fn reopen_requires_admin() {
        let (engine, _, script) = setup().await;
        drive(&engine, script.id, LabScriptCommand::Start).await;
        drive(&engine, script.id, LabScriptCommand::Complete).await;

        let err = engine
            .transition_lab_script(&tech(), script.id, &LabScriptCommand::Reopen, None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));

        let reopened = engine
            .transition_lab_script(&admin(), script.id, &LabScriptCommand::Reopen, Some("redo"))
            .await
            .unwrap();
        assert_eq!(reopened.record().status, LabScriptStatus::InProgress);
        assert_eq!(reopened.record().status_notes.as_deref(), Some("redo"));
    }

    #[tokio::test]
    async fn missing_lab_script_is_not_found() {
        let (engine, store, script) = setup().await;
        store.delete_lab_script(script.id).await;
        let err = engine
            .transition_lab_script(&tech(), script.id, &LabScriptCommand::Start, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("may have been deleted"));
    }

    #[tokio::test]
    async fn clinical_info_after_completion() {
        let (engine, _, script) = setup().await;
        drive(&engine, script.id, LabScriptCommand::Start).await;
        drive(&engine, script.id, LabScriptCommand::Complete).await;

        let err = engine
            .save_clinical_info(&tech(), script.id, &ClinicalInfoInput::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));

        let info = engine
            .save_clinical_info(
                &clinician(),
                script.id,
                &ClinicalInfoInput {
                    fit_assessment: Some("seated well".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(info.updated_by, clinician().user_id);

        let card = engine.report_card(script.id).await.unwrap();
        assert!(card.clinical_info.is_some());
        assert!(card.design_info.is_none());
    }

    /// Store wrapper whose conditional writes always miss, after letting a
    /// hook change the underlying row, to exercise the re-read path.
    struct RacingStore {
        inner: Arc<InMemoryStore>,
        race_to: LabScriptStatus,
    }

    #[async_trait]
    impl WorkflowStore for RacingStore {
        async fn create_patient(&self, input: &NewPatient) -> Result<Patient, CoreError> {
            self.inner.create_patient(input).await
        }
        async fn find_patient(&self, id: DbId) -> Result<Option<Patient>, CoreError> {
            self.inner.find_patient(id).await
        }
        async fn list_patients(&self, limit: i64, offset: i64) -> Result<Vec<Patient>, CoreError> {
            self.inner.list_patients(limit, offset).await
        }
        async fn create_lab_script(
            &self,
            input: &NewLabScript,
        ) -> Result<(LabScript, ManufacturingLog), CoreError> {
            self.inner.create_lab_script(input).await
        }
        async fn find_lab_script(&self, id: DbId) -> Result<Option<LabScript>, CoreError> {
            self.inner.find_lab_script(id).await
        }
        async fn list_lab_scripts(
            &self,
            filter: &LabScriptFilter,
        ) -> Result<Vec<LabScript>, CoreError> {
            self.inner.list_lab_scripts(filter).await
        }
        async fn swap_lab_script(
            &self,
            _expected: LabScriptStatus,
            next: &LabScript,
        ) -> Result<Option<LabScript>, CoreError> {
            let mut raced = next.clone();
            raced.status = self.race_to;
            raced.hold_reason = None;
            raced.completed_at = None;
            if self.race_to == LabScriptStatus::Completed {
                raced.completed_at = Some(Utc::now());
            }
            self.inner.overwrite_lab_script(raced).await;
            Ok(None)
        }
        async fn find_manufacturing_log(
            &self,
            lab_script_id: DbId,
        ) -> Result<Option<ManufacturingLog>, CoreError> {
            self.inner.find_manufacturing_log(lab_script_id).await
        }
        async fn swap_stage(
            &self,
            log_id: DbId,
            update: &StageUpdate,
            now: Timestamp,
        ) -> Result<Option<ManufacturingLog>, CoreError> {
            self.inner.swap_stage(log_id, update, now).await
        }
        async fn find_design_info(
            &self,
            lab_script_id: DbId,
        ) -> Result<Option<DesignInfo>, CoreError> {
            self.inner.find_design_info(lab_script_id).await
        }
        async fn find_clinical_info(
            &self,
            lab_script_id: DbId,
        ) -> Result<Option<ClinicalInfo>, CoreError> {
            self.inner.find_clinical_info(lab_script_id).await
        }
        async fn upsert_design_info(
            &self,
            lab_script_id: DbId,
            input: &DesignInfoInput,
            actor: UserId,
        ) -> Result<Option<DesignInfo>, CoreError> {
            self.inner.upsert_design_info(lab_script_id, input, actor).await
        }
        async fn upsert_clinical_info(
            &self,
            lab_script_id: DbId,
            input: &ClinicalInfoInput,
            actor: UserId,
        ) -> Result<Option<ClinicalInfo>, CoreError> {
            self.inner.upsert_clinical_info(lab_script_id, input, actor).await
        }
    }

    async fn racing_engine(race_to: LabScriptStatus) -> (WorkflowEngine, LabScript) {
        let (engine, store, script) = setup().await;
        drive(&engine, script.id, LabScriptCommand::Start).await;
        let racing = WorkflowEngine::new(Arc::new(RacingStore {
            inner: store,
            race_to,
        }));
        (racing, script)
    }

    #[tokio::test]
    async fn lost_race_to_same_target_is_a_no_op() {
        let (engine, script) = racing_engine(LabScriptStatus::Completed).await;
        let outcome = engine
            .transition_lab_script(&tech(), script.id, &LabScriptCommand::Complete, None)
            .await
            .unwrap();
        assert_matches!(outcome, Transition::Unchanged { .. });
        assert_eq!(outcome.record().status, LabScriptStatus::Completed);
    }

    #[tokio::test]
    async fn lost_race_to_other_state_is_a_conflict() {
        let (engine, script) = racing_engine(LabScriptStatus::Paused).await;
        let err = engine
            .transition_lab_script(&tech(), script.id, &LabScriptCommand::Complete, None)
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(ref msg) if msg.contains("'paused'"));
    }
}
