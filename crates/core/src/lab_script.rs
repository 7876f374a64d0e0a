//! Lab script (work order) lifecycle.
//!
//! ```text
//! pending --start--> in_progress --pause--> paused --resume--> in_progress
//!                    in_progress --hold---> hold   --resume--> in_progress
//!                    in_progress --complete--> completed --reopen--> in_progress
//! ```
//!
//! `pause`, `hold`, `complete` and `resume` are idempotent: applying them to
//! a lab script already in their target status is a successful no-op.
//! `start` and `reopen` are strict.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hold::HoldReason;
use crate::manufacturing::ManufacturingMethod;
use crate::roles::{LAB_ROLES, ROLE_ADMIN};
use crate::types::{DbId, Timestamp, UserId};
use crate::workflow::{Plan, Rule, StateMachine, Step, WorkflowAction};

/// Maximum length for free-text name fields.
pub const MAX_NAME_LENGTH: usize = 200;

/// Maximum length for lab script notes and status notes.
pub const MAX_NOTES_LENGTH: usize = 5_000;

crate::define_workflow_enum! {
    /// Lab script status as persisted in `lab_scripts.status`.
    LabScriptStatus("lab script status") {
        Pending = "pending",
        InProgress = "in_progress",
        Paused = "paused",
        Hold = "hold",
        Completed = "completed",
    }
}

crate::define_workflow_enum! {
    /// Operations that move a lab script between statuses.
    LabScriptAction("lab script action") {
        Start = "start",
        Pause = "pause",
        Hold = "hold",
        Complete = "complete",
        Resume = "resume",
        Reopen = "reopen",
    }
}

crate::define_workflow_enum! {
    /// Which arch a lab script covers.
    Arch("arch") {
        Upper = "upper",
        Lower = "lower",
        Dual = "dual",
    }
}

impl LabScriptStatus {
    /// Whether this status must carry a hold reason.
    pub fn is_hold(self) -> bool {
        self == LabScriptStatus::Hold
    }
}

impl WorkflowAction for LabScriptAction {
    fn is_idempotent(self) -> bool {
        !matches!(self, LabScriptAction::Start | LabScriptAction::Reopen)
    }
}

impl LabScriptAction {
    /// Roles allowed to perform this action.
    pub fn required_roles(self) -> &'static [&'static str] {
        match self {
            LabScriptAction::Reopen => &[ROLE_ADMIN],
            _ => LAB_ROLES,
        }
    }
}

const LAB_SCRIPT_RULES: &[Rule<LabScriptStatus, LabScriptAction>] = &[
    Rule {
        from: LabScriptStatus::Pending,
        action: LabScriptAction::Start,
        to: LabScriptStatus::InProgress,
    },
    Rule {
        from: LabScriptStatus::InProgress,
        action: LabScriptAction::Pause,
        to: LabScriptStatus::Paused,
    },
    Rule {
        from: LabScriptStatus::InProgress,
        action: LabScriptAction::Hold,
        to: LabScriptStatus::Hold,
    },
    Rule {
        from: LabScriptStatus::InProgress,
        action: LabScriptAction::Complete,
        to: LabScriptStatus::Completed,
    },
    Rule {
        from: LabScriptStatus::Paused,
        action: LabScriptAction::Resume,
        to: LabScriptStatus::InProgress,
    },
    Rule {
        from: LabScriptStatus::Hold,
        action: LabScriptAction::Resume,
        to: LabScriptStatus::InProgress,
    },
    Rule {
        from: LabScriptStatus::Completed,
        action: LabScriptAction::Reopen,
        to: LabScriptStatus::InProgress,
    },
];

/// The lab script state machine.
pub static LAB_SCRIPT_MACHINE: StateMachine<LabScriptStatus, LabScriptAction> =
    StateMachine::new("lab script", LAB_SCRIPT_RULES);

/* --------------------------------------------------------------------------
Records
-------------------------------------------------------------------------- */

/// A lab script with its workflow fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabScript {
    pub id: DbId,
    pub patient_id: DbId,
    pub doctor_name: String,
    pub clinic_name: Option<String>,
    pub appliance_type: String,
    pub arch: Arch,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: LabScriptStatus,
    pub hold_reason: Option<HoldReason>,
    pub status_changed_at: Option<Timestamp>,
    pub status_changed_by: Option<UserId>,
    pub status_notes: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LabScript {
    /// Check the field-level invariants of the workflow columns.
    pub fn check_invariants(&self) -> Result<(), CoreError> {
        if self.status.is_hold() != self.hold_reason.is_some() {
            return Err(CoreError::Internal(format!(
                "lab script {} has status '{}' but hold reason is {}",
                self.id,
                self.status,
                if self.hold_reason.is_some() { "set" } else { "missing" }
            )));
        }
        if self.completed_at.is_some() && self.status != LabScriptStatus::Completed {
            return Err(CoreError::Internal(format!(
                "lab script {} has a completion time but status '{}'",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Actions legal from the current status.
    pub fn available_actions(&self) -> Vec<LabScriptAction> {
        LAB_SCRIPT_MACHINE.available_actions(self.status)
    }
}

/// Input for creating a lab script. The script always starts `pending`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewLabScript {
    pub patient_id: DbId,
    pub doctor_name: String,
    pub clinic_name: Option<String>,
    pub appliance_type: String,
    pub arch: Arch,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Production method recorded on the manufacturing log created alongside.
    pub manufacturing_method: Option<ManufacturingMethod>,
}

impl NewLabScript {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_required_text("doctor_name", &self.doctor_name, MAX_NAME_LENGTH)?;
        validate_required_text("appliance_type", &self.appliance_type, MAX_NAME_LENGTH)?;
        if let Some(clinic) = &self.clinic_name {
            validate_length("clinic_name", clinic, MAX_NAME_LENGTH)?;
        }
        if let Some(notes) = &self.notes {
            validate_length("notes", notes, MAX_NOTES_LENGTH)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_required_text(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    validate_length(field, value, max)
}

pub(crate) fn validate_length(field: &str, value: &str, max: usize) -> Result<(), CoreError> {
    if value.chars().count() > max {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {max} characters"
        )));
    }
    Ok(())
}

/* --------------------------------------------------------------------------
Commands and planning
-------------------------------------------------------------------------- */

/// A transition request with the data it needs already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum LabScriptCommand {
    Start,
    Pause,
    Hold(HoldReason),
    Complete,
    Resume,
    Reopen,
}

impl LabScriptCommand {
    /// Pair an action with its auxiliary data.
    ///
    /// `hold` without a reason is [`CoreError::MissingRequiredData`]; a
    /// reason on any other action is a validation error.
    pub fn from_parts(
        action: LabScriptAction,
        hold: Option<HoldReason>,
    ) -> Result<Self, CoreError> {
        match (action, hold) {
            (LabScriptAction::Hold, Some(reason)) => Ok(LabScriptCommand::Hold(reason)),
            (LabScriptAction::Hold, None) => Err(CoreError::MissingRequiredData(
                "A hold reason is required to put a lab script on hold".to_string(),
            )),
            (other, Some(_)) => Err(CoreError::Validation(format!(
                "A hold reason is only accepted with the 'hold' action, not '{other}'"
            ))),
            (LabScriptAction::Start, None) => Ok(LabScriptCommand::Start),
            (LabScriptAction::Pause, None) => Ok(LabScriptCommand::Pause),
            (LabScriptAction::Complete, None) => Ok(LabScriptCommand::Complete),
            (LabScriptAction::Resume, None) => Ok(LabScriptCommand::Resume),
            (LabScriptAction::Reopen, None) => Ok(LabScriptCommand::Reopen),
        }
    }

    pub fn action(&self) -> LabScriptAction {
        match self {
            LabScriptCommand::Start => LabScriptAction::Start,
            LabScriptCommand::Pause => LabScriptAction::Pause,
            LabScriptCommand::Hold(_) => LabScriptAction::Hold,
            LabScriptCommand::Complete => LabScriptAction::Complete,
            LabScriptCommand::Resume => LabScriptAction::Resume,
            LabScriptCommand::Reopen => LabScriptAction::Reopen,
        }
    }
}

/// Compute the next version of `script` after `command`.
///
/// Every applied transition stamps `status_changed_at`/`status_changed_by`
/// and replaces `status_notes`. Hold metadata exists only in `hold`;
/// completion metadata only in `completed`.
pub fn plan_transition(
    script: &LabScript,
    command: &LabScriptCommand,
    actor: UserId,
    notes: Option<&str>,
    now: Timestamp,
) -> Result<Plan<LabScript>, CoreError> {
    let to = match LAB_SCRIPT_MACHINE.check(script.id, script.status, command.action())? {
        Step::Stay(_) => return Ok(Plan::Unchanged),
        Step::Move { to, .. } => to,
    };

    let notes = notes.map(str::trim).filter(|n| !n.is_empty());
    if let Some(n) = notes {
        validate_length("status_notes", n, MAX_NOTES_LENGTH)?;
    }

    let mut next = script.clone();
    next.status = to;
    next.status_changed_at = Some(now);
    next.status_changed_by = Some(actor);
    next.status_notes = notes.map(str::to_string);
    next.updated_at = now;

    match command {
        LabScriptCommand::Hold(reason) => next.hold_reason = Some(reason.clone()),
        LabScriptCommand::Complete => {
            next.hold_reason = None;
            next.completed_at = Some(now);
        }
        LabScriptCommand::Reopen => {
            next.hold_reason = None;
            next.completed_at = None;
        }
        LabScriptCommand::Start | LabScriptCommand::Pause | LabScriptCommand::Resume => {
            next.hold_reason = None;
        }
    }

    Ok(Plan::Apply(next))
}

/* --------------------------------------------------------------------------
Tests
-------------------------------------------------------------------------- */
