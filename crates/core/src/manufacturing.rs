//! Manufacturing stage chain.
//!
//! A manufacturing log tracks four sequential stages. Each stage runs its own
//! small state machine:
//!
//! ```text
//! pending --start--> in_progress --complete--> completed
//!                    in_progress --hold--> on_hold --resume--> in_progress
//! ```
//!
//! Inspection replaces `complete` with `approve` / `reject`. A stage may only
//! start once the stage before it is `completed`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lab_script::validate_length;
use crate::types::{DbId, Timestamp};
use crate::workflow::{Plan, Rule, StateMachine, Step, WorkflowAction};

/// Maximum length of a stage hold reason.
pub const MAX_STAGE_HOLD_REASON_LENGTH: usize = 2_000;

crate::define_workflow_enum! {
    /// A production stage, in chain order.
    Stage("manufacturing stage") {
        Manufacturing = "manufacturing",
        Sintering = "sintering",
        Miyo = "miyo",
        Inspection = "inspection",
    }
}

crate::define_workflow_enum! {
    /// How the manufacturing stage produces the appliance.
    ManufacturingMethod("manufacturing method") {
        Milling = "milling",
        Printing = "printing",
    }
}

crate::define_workflow_enum! {
    /// Status of a single stage, persisted in `<stage>_status`.
    StageStatus("stage status") {
        Pending = "pending",
        InProgress = "in_progress",
        OnHold = "on_hold",
        Completed = "completed",
        Approved = "approved",
        Rejected = "rejected",
    }
}

crate::define_workflow_enum! {
    /// Operations on a single stage.
    StageAction("stage action") {
        Start = "start",
        Hold = "hold",
        Resume = "resume",
        Complete = "complete",
        Approve = "approve",
        Reject = "reject",
    }
}

impl WorkflowAction for StageAction {
    fn is_idempotent(self) -> bool {
        self != StageAction::Start
    }
}

impl Stage {
    /// The stage that must be `completed` before this one may start.
    pub fn previous(self) -> Option<Stage> {
        match self {
            Stage::Manufacturing => None,
            Stage::Sintering => Some(Stage::Manufacturing),
            Stage::Miyo => Some(Stage::Sintering),
            Stage::Inspection => Some(Stage::Miyo),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Manufacturing => "Manufacturing",
            Stage::Sintering => "Sintering",
            Stage::Miyo => "Miyo",
            Stage::Inspection => "Inspection",
        }
    }

    /// Prefix of this stage's columns in `manufacturing_logs`.
    pub fn column_prefix(self) -> &'static str {
        self.as_str()
    }

    /// The state machine governing this stage.
    pub fn machine(self) -> &'static StateMachine<StageStatus, StageAction> {
        match self {
            Stage::Inspection => &INSPECTION_MACHINE,
            _ => &STAGE_MACHINE,
        }
    }
}

const STAGE_RULES: &[Rule<StageStatus, StageAction>] = &[
    Rule {
        from: StageStatus::Pending,
        action: StageAction::Start,
        to: StageStatus::InProgress,
    },
    Rule {
        from: StageStatus::InProgress,
        action: StageAction::Hold,
        to: StageStatus::OnHold,
    },
    Rule {
        from: StageStatus::OnHold,
        action: StageAction::Resume,
        to: StageStatus::InProgress,
    },
    Rule {
        from: StageStatus::InProgress,
        action: StageAction::Complete,
        to: StageStatus::Completed,
    },
];

const INSPECTION_RULES: &[Rule<StageStatus, StageAction>] = &[
    Rule {
        from: StageStatus::Pending,
        action: StageAction::Start,
        to: StageStatus::InProgress,
    },
    Rule {
        from: StageStatus::InProgress,
        action: StageAction::Hold,
        to: StageStatus::OnHold,
    },
    Rule {
        from: StageStatus::OnHold,
        action: StageAction::Resume,
        to: StageStatus::InProgress,
    },
    Rule {
        from: StageStatus::InProgress,
        action: StageAction::Approve,
        to: StageStatus::Approved,
    },
    Rule {
        from: StageStatus::InProgress,
        action: StageAction::Reject,
        to: StageStatus::Rejected,
    },
];

/// Machine for manufacturing, sintering and miyo.
pub static STAGE_MACHINE: StateMachine<StageStatus, StageAction> =
    StateMachine::new("manufacturing stage", STAGE_RULES);

/// Machine for the inspection stage.
pub static INSPECTION_MACHINE: StateMachine<StageStatus, StageAction> =
    StateMachine::new("inspection stage", INSPECTION_RULES);

/* --------------------------------------------------------------------------
Records
-------------------------------------------------------------------------- */

/// Workflow fields of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageState {
    pub status: StageStatus,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub hold_at: Option<Timestamp>,
    pub hold_reason: Option<String>,
}

impl StageState {
    pub fn pending() -> Self {
        Self {
            status: StageStatus::Pending,
            started_at: None,
            completed_at: None,
            hold_at: None,
            hold_reason: None,
        }
    }
}

impl Default for StageState {
    fn default() -> Self {
        Self::pending()
    }
}

/// Per-lab-script record of the four production stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManufacturingLog {
    pub id: DbId,
    pub lab_script_id: DbId,
    pub method: Option<ManufacturingMethod>,
    pub manufacturing: StageState,
    pub sintering: StageState,
    pub miyo: StageState,
    pub inspection: StageState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ManufacturingLog {
    pub fn stage(&self, stage: Stage) -> &StageState {
        match stage {
            Stage::Manufacturing => &self.manufacturing,
            Stage::Sintering => &self.sintering,
            Stage::Miyo => &self.miyo,
            Stage::Inspection => &self.inspection,
        }
    }

    pub fn stage_mut(&mut self, stage: Stage) -> &mut StageState {
        match stage {
            Stage::Manufacturing => &mut self.manufacturing,
            Stage::Sintering => &mut self.sintering,
            Stage::Miyo => &mut self.miyo,
            Stage::Inspection => &mut self.inspection,
        }
    }

    /// Check that hold metadata only appears on stages that are on hold.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        for stage in Stage::ALL {
            let state = self.stage(*stage);
            let on_hold = state.status == StageStatus::OnHold;
            if on_hold != state.hold_reason.is_some() {
                return Err(CoreError::Internal(format!(
                    "manufacturing log {} stage '{}' is '{}' with inconsistent hold reason",
                    self.id, stage, state.status
                )));
            }
        }
        Ok(())
    }
}

/* --------------------------------------------------------------------------
Commands and planning
-------------------------------------------------------------------------- */

/// A validated stage transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageCommand {
    Start,
    Hold(String),
    Resume,
    Complete,
    Approve,
    Reject,
}

impl StageCommand {
    /// Pair an action with its reason. `hold` requires a non-blank reason.
    pub fn from_parts(action: StageAction, reason: Option<&str>) -> Result<Self, CoreError> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        match (action, reason) {
            (StageAction::Hold, Some(reason)) => {
                validate_length("reason", reason, MAX_STAGE_HOLD_REASON_LENGTH)?;
                Ok(StageCommand::Hold(reason.to_string()))
            }
            (StageAction::Hold, None) => Err(CoreError::MissingRequiredData(
                "A reason is required to put a manufacturing stage on hold".to_string(),
            )),
            (other, Some(_)) => Err(CoreError::Validation(format!(
                "A reason is only accepted with the 'hold' action, not '{other}'"
            ))),
            (StageAction::Start, None) => Ok(StageCommand::Start),
            (StageAction::Resume, None) => Ok(StageCommand::Resume),
            (StageAction::Complete, None) => Ok(StageCommand::Complete),
            (StageAction::Approve, None) => Ok(StageCommand::Approve),
            (StageAction::Reject, None) => Ok(StageCommand::Reject),
        }
    }

    pub fn action(&self) -> StageAction {
        match self {
            StageCommand::Start => StageAction::Start,
            StageCommand::Hold(_) => StageAction::Hold,
            StageCommand::Resume => StageAction::Resume,
            StageCommand::Complete => StageAction::Complete,
            StageCommand::Approve => StageAction::Approve,
            StageCommand::Reject => StageAction::Reject,
        }
    }
}

/// A planned write to one stage of a manufacturing log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    pub stage: Stage,
    /// Status the stage must still have for the write to apply.
    pub expected: StageStatus,
    pub next: StageState,
    /// Stage that must still be `completed` for the write to apply.
    pub requires_completed: Option<Stage>,
}

/// Plan `command` against `stage` of `log`.
///
/// `start` additionally requires the previous stage to be `completed`
/// ([`CoreError::PreconditionFailed`] otherwise).
pub fn plan_stage_transition(
    log: &ManufacturingLog,
    stage: Stage,
    command: &StageCommand,
    now: Timestamp,
) -> Result<Plan<StageUpdate>, CoreError> {
    let current = log.stage(stage);
    let action = command.action();

    let to = match stage.machine().check(log.id, current.status, action)? {
        Step::Stay(_) => return Ok(Plan::Unchanged),
        Step::Move { to, .. } => to,
    };

    let requires_completed = if action == StageAction::Start {
        stage.previous()
    } else {
        None
    };
    if let Some(prev) = requires_completed {
        let prev_status = log.stage(prev).status;
        if prev_status != StageStatus::Completed {
            return Err(CoreError::PreconditionFailed(format!(
                "Cannot start {} until {} is completed (currently '{}')",
                stage.label(),
                prev.label(),
                prev_status
            )));
        }
    }

    let mut next = current.clone();
    next.status = to;
    match command {
        StageCommand::Start => {
            next.started_at = Some(now);
        }
        StageCommand::Hold(reason) => {
            next.hold_at = Some(now);
            next.hold_reason = Some(reason.clone());
        }
        StageCommand::Resume => {
            next.hold_at = None;
            next.hold_reason = None;
        }
        StageCommand::Complete | StageCommand::Approve | StageCommand::Reject => {
            next.completed_at = Some(now);
        }
    }

    Ok(Plan::Apply(StageUpdate {
        stage,
        expected: current.status,
        next,
        requires_completed,
    }))
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 4, 10, 14, 0, 0).unwrap()
    }

    fn log() -> ManufacturingLog {
        let created = Utc.with_ymd_and_hms(2026, 4, 9, 8, 0, 0).unwrap();
        ManufacturingLog {
            id: 7,
            lab_script_id: 11,
            method: Some(ManufacturingMethod::Milling),
            manufacturing: StageState::pending(),
            sintering: StageState::pending(),
            miyo: StageState::pending(),
            inspection: StageState::pending(),
            created_at: created,
            updated_at: created,
        }
    }

    fn applied(plan: Plan<StageUpdate>) -> StageUpdate {
        match plan {
            Plan::Apply(update) => update,
            Plan::Unchanged => panic!("expected the transition to apply"),
        }
    }

    #[test]
    fn chain_order_follows_previous() {
        assert_eq!(Stage::Manufacturing.previous(), None);
        assert_eq!(Stage::Sintering.previous(), Some(Stage::Manufacturing));
        assert_eq!(Stage::Miyo.previous(), Some(Stage::Sintering));
        assert_eq!(Stage::Inspection.previous(), Some(Stage::Miyo));
    }

    #[test]
    fn first_stage_starts_without_precondition() {
        let update = applied(
            plan_stage_transition(&log(), Stage::Manufacturing, &StageCommand::Start, now())
                .unwrap(),
        );
        assert_eq!(update.expected, StageStatus::Pending);
        assert_eq!(update.next.status, StageStatus::InProgress);
        assert_eq!(update.next.started_at, Some(now()));
        assert_eq!(update.requires_completed, None);
    }

    #[test]
    fn scenario_sintering_waits_for_manufacturing() {
        let mut log = log();
        log.manufacturing.status = StageStatus::InProgress;

        let err = plan_stage_transition(&log, Stage::Sintering, &StageCommand::Start, now())
            .unwrap_err();
        assert_matches!(err, CoreError::PreconditionFailed(ref msg) if msg.contains("Manufacturing"));

        log.manufacturing.status = StageStatus::Completed;
        let update = applied(
            plan_stage_transition(&log, Stage::Sintering, &StageCommand::Start, now()).unwrap(),
        );
        assert_eq!(update.next.status, StageStatus::InProgress);
        assert_eq!(update.requires_completed, Some(Stage::Manufacturing));
    }

    #[test]
    fn invalid_transition_wins_over_precondition() {
        let mut log = log();
        log.miyo.status = StageStatus::Completed;
        let err =
            plan_stage_transition(&log, Stage::Miyo, &StageCommand::Start, now()).unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { .. });
    }

    #[test]
    fn hold_and_resume_manage_hold_metadata() {
        let mut log = log();
        log.manufacturing.status = StageStatus::InProgress;

        let held = applied(
            plan_stage_transition(
                &log,
                Stage::Manufacturing,
                &StageCommand::Hold("burr broke".to_string()),
                now(),
            )
            .unwrap(),
        );
        assert_eq!(held.next.status, StageStatus::OnHold);
        assert_eq!(held.next.hold_reason.as_deref(), Some("burr broke"));
        assert_eq!(held.next.hold_at, Some(now()));

        log.manufacturing = held.next;
        log.check_invariants().unwrap();

        let resumed = applied(
            plan_stage_transition(&log, Stage::Manufacturing, &StageCommand::Resume, now())
                .unwrap(),
        );
        assert_eq!(resumed.next.status, StageStatus::InProgress);
        assert!(resumed.next.hold_reason.is_none());
        assert!(resumed.next.hold_at.is_none());
    }

    #[test]
    fn inspection_branches_into_approved_or_rejected() {
        let mut log = log();
        log.inspection.status = StageStatus::InProgress;

        let approved = applied(
            plan_stage_transition(&log, Stage::Inspection, &StageCommand::Approve, now()).unwrap(),
        );
        assert_eq!(approved.next.status, StageStatus::Approved);
        assert_eq!(approved.next.completed_at, Some(now()));

        let rejected = applied(
            plan_stage_transition(&log, Stage::Inspection, &StageCommand::Reject, now()).unwrap(),
        );
        assert_eq!(rejected.next.status, StageStatus::Rejected);

        let err = plan_stage_transition(&log, Stage::Inspection, &StageCommand::Complete, now())
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { ref allowed, .. }
            if allowed.contains(&"approve".to_string()));
    }

    #[test]
    fn non_inspection_stages_cannot_be_approved() {
        let mut log = log();
        log.sintering.status = StageStatus::InProgress;
        let err = plan_stage_transition(&log, Stage::Sintering, &StageCommand::Approve, now())
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidTransition { .. });
    }

    #[test]
    fn repeated_complete_is_a_no_op() {
        let mut log = log();
        log.manufacturing.status = StageStatus::Completed;
        let plan =
            plan_stage_transition(&log, Stage::Manufacturing, &StageCommand::Complete, now())
                .unwrap();
        assert_eq!(plan, Plan::Unchanged);
    }

    #[test]
    fn hold_requires_reason() {
        assert_matches!(
            StageCommand::from_parts(StageAction::Hold, Some("   ")),
            Err(CoreError::MissingRequiredData(_))
        );
        assert_eq!(
            StageCommand::from_parts(StageAction::Hold, Some(" waiting ")).unwrap(),
            StageCommand::Hold("waiting".to_string())
        );
        assert_matches!(
            StageCommand::from_parts(StageAction::Start, Some("x")),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn stage_names_parse() {
        assert_eq!("miyo".parse::<Stage>().unwrap(), Stage::Miyo);
        assert_matches!("glazing".parse::<Stage>(), Err(CoreError::Validation(_)));
        assert_eq!(Stage::Sintering.column_prefix(), "sintering");
    }
}
