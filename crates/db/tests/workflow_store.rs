//! Integration tests for the PostgreSQL workflow store.
//!
//! These need a database (`DATABASE_URL`) and are ignored by default:
//! `cargo test -p labflow-db -- --ignored`.

use std::sync::Arc;

use assert_matches::assert_matches;
use labflow_core::engine::WorkflowEngine;
use labflow_core::error::CoreError;
use labflow_core::hold::HoldReason;
use labflow_core::lab_script::{Arch, LabScriptCommand, LabScriptStatus, NewLabScript};
use labflow_core::manufacturing::{ManufacturingMethod, Stage, StageCommand, StageStatus};
use labflow_core::patient::NewPatient;
use labflow_core::report_card::DesignInfoInput;
use labflow_core::roles::ROLE_TECHNICIAN;
use labflow_core::session::Session;
use labflow_core::store::WorkflowStore;
use labflow_core::types::UserId;
use labflow_db::repositories::LabScriptRepo;
use labflow_db::PgWorkflowStore;
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const TECH_ID: UserId = UserId::from_u128(0x6f1c_1a8e_3c1b_4d8e_9a55_0d6c_2f4f_3b21);

fn tech() -> Session {
    Session::new(TECH_ID, ROLE_TECHNICIAN)
}

async fn setup(pool: PgPool) -> (WorkflowEngine, i64) {
    let engine = WorkflowEngine::new(Arc::new(PgWorkflowStore::new(pool)));
    let patient = engine
        .create_patient(
            &tech(),
            &NewPatient {
                first_name: "Mara".to_string(),
                last_name: "Quill".to_string(),
                date_of_birth: None,
                phone: None,
                email: None,
            },
        )
        .await
        .unwrap();
    let (script, log) = engine
        .create_lab_script(
            &tech(),
            &NewLabScript {
                patient_id: patient.id,
                doctor_name: "Dr. Vance".to_string(),
                clinic_name: Some("Harbor Dental".to_string()),
                appliance_type: "Implant crown".to_string(),
                arch: Arch::Upper,
                due_date: None,
                notes: None,
                manufacturing_method: Some(ManufacturingMethod::Printing),
            },
        )
        .await
        .unwrap();
    assert_eq!(script.status, LabScriptStatus::Pending);
    assert_eq!(log.method, Some(ManufacturingMethod::Printing));
    (engine, script.id)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_hold_reason_persists_and_clears(pool: PgPool) {
    let (engine, id) = setup(pool).await;
    engine
        .transition_lab_script(&tech(), id, &LabScriptCommand::Start, None)
        .await
        .unwrap();

    let reason = HoldReason::parse("Hold for Insufficient Data: need x-ray", None).unwrap();
    let held = engine
        .transition_lab_script(&tech(), id, &LabScriptCommand::Hold(reason), None)
        .await
        .unwrap()
        .into_record();
    assert_eq!(
        held.hold_reason.map(|r| r.to_string()).as_deref(),
        Some("Hold for Insufficient Data: need x-ray")
    );
    assert_eq!(held.status_changed_by, Some(TECH_ID));

    let resumed = engine
        .transition_lab_script(&tech(), id, &LabScriptCommand::Resume, None)
        .await
        .unwrap()
        .into_record();
    assert_eq!(resumed.status, LabScriptStatus::InProgress);
    assert!(resumed.hold_reason.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_conditional_update_misses_on_stale_status(pool: PgPool) {
    let (engine, id) = setup(pool.clone()).await;
    let stale = engine.lab_script(id).await.unwrap();
    engine
        .transition_lab_script(&tech(), id, &LabScriptCommand::Start, None)
        .await
        .unwrap();

    let mut next = stale.clone();
    next.status = LabScriptStatus::InProgress;
    let row = LabScriptRepo::update_if_status(&pool, LabScriptStatus::Pending, &next)
        .await
        .unwrap();
    assert!(row.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_stage_start_requires_previous_completed(pool: PgPool) {
    let (engine, id) = setup(pool).await;
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
    let log = engine
        .transition_stage(&tech(), id, Stage::Sintering, &StageCommand::Start)
        .await
        .unwrap()
        .into_record();
    assert_eq!(log.sintering.status, StageStatus::InProgress);
    assert!(log.sintering.started_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_design_info_gated_in_sql(pool: PgPool) {
    let (engine, id) = setup(pool).await;
    let err = engine
        .save_design_info(&tech(), id, &DesignInfoInput::default())
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::LabScriptIncomplete { .. });

    let store = engine.store();
    assert!(store.find_design_info(id).await.unwrap().is_none());
    let written = store
        .upsert_design_info(id, &DesignInfoInput::default(), TECH_ID)
        .await
        .unwrap();
    assert!(written.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_concurrent_completes_apply_once(pool: PgPool) {
    let (engine, id) = setup(pool).await;
    engine
        .transition_lab_script(&tech(), id, &LabScriptCommand::Start, None)
        .await
        .unwrap();

    let a = engine.clone();
    let b = engine.clone();
    let (sa, sb) = (tech(), tech());
    let (ra, rb) = tokio::join!(
        a.transition_lab_script(&sa, id, &LabScriptCommand::Complete, None),
        b.transition_lab_script(&sb, id, &LabScriptCommand::Complete, None),
    );
    let applied = [ra.unwrap(), rb.unwrap()]
        .iter()
        .filter(|t| t.is_applied())
        .count();
    assert_eq!(applied, 1);

    let stored = engine.lab_script(id).await.unwrap();
    stored.check_invariants().unwrap();
}
