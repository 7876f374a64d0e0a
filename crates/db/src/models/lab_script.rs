//! Lab script rows.

use chrono::NaiveDate;
use labflow_core::error::CoreError;
use labflow_core::hold::{ApprovalHold, HoldReason};
use labflow_core::lab_script::LabScript;
use labflow_core::types::{DbId, Timestamp, UserId};
use sqlx::FromRow;

/// A row from the `lab_scripts` table.
#[derive(Debug, Clone, FromRow)]
pub struct LabScriptRow {
    pub id: DbId,
    pub patient_id: DbId,
    pub doctor_name: String,
    pub clinic_name: Option<String>,
    pub appliance_type: String,
    pub arch: String,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: String,
    pub hold_reason: Option<String>,
    /// Structured approval data for "hold for approval" reasons.
    pub hold_details: Option<serde_json::Value>,
    pub status_changed_at: Option<Timestamp>,
    pub status_changed_by: Option<UserId>,
    pub status_notes: Option<String>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<LabScriptRow> for LabScript {
    type Error = CoreError;

    fn try_from(row: LabScriptRow) -> Result<Self, Self::Error> {
        let approval = row
            .hold_details
            .map(serde_json::from_value::<ApprovalHold>)
            .transpose()
            .map_err(|e| {
                CoreError::Internal(format!("lab script {} has malformed hold details: {e}", row.id))
            })?;
        let hold_reason = row
            .hold_reason
            .as_deref()
            .map(|text| HoldReason::parse(text, approval))
            .transpose()?;

        Ok(LabScript {
            id: row.id,
            patient_id: row.patient_id,
            doctor_name: row.doctor_name,
            clinic_name: row.clinic_name,
            appliance_type: row.appliance_type,
            arch: row.arch.parse()?,
            due_date: row.due_date,
            notes: row.notes,
            status: row.status.parse()?,
            hold_reason,
            status_changed_at: row.status_changed_at,
            status_changed_by: row.status_changed_by,
            status_notes: row.status_notes,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Split a hold reason into the `hold_reason` text and `hold_details` JSON
/// columns.
pub fn hold_columns(reason: Option<&HoldReason>) -> (Option<String>, Option<serde_json::Value>) {
    match reason {
        Some(r) => (
            Some(r.to_string()),
            r.approval().and_then(|a| serde_json::to_value(a).ok()),
        ),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use labflow_core::lab_script::{Arch, LabScriptStatus};

    use super::*;

    fn row(status: &str, hold_reason: Option<&str>) -> LabScriptRow {
        let now = Utc::now();
        LabScriptRow {
            id: 5,
            patient_id: 2,
            doctor_name: "Dr. Lind".to_string(),
            clinic_name: None,
            appliance_type: "Night guard".to_string(),
            arch: "dual".to_string(),
            due_date: None,
            notes: None,
            status: status.to_string(),
            hold_reason: hold_reason.map(str::to_string),
            hold_details: None,
            status_changed_at: None,
            status_changed_by: None,
            status_notes: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn known_status_converts() {
        let script = LabScript::try_from(row("hold", Some("Hold for Payment: deposit"))).unwrap();
        assert_eq!(script.status, LabScriptStatus::Hold);
        assert_eq!(script.arch, Arch::Dual);
        assert_eq!(script.hold_reason.unwrap().comment(), Some("deposit"));
    }

    #[test]
    fn unknown_status_rejected() {
        let err = LabScript::try_from(row("on_hold", None)).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn approval_details_round_trip_through_columns() {
        let mut r = row("hold", Some("Hold for Approval: margins"));
        r.hold_details = Some(serde_json::json!({
            "design_link": "https://designs.example.com/7",
            "attachments": ["a.stl"],
        }));
        let script = LabScript::try_from(r).unwrap();
        let reason = script.hold_reason.unwrap();
        assert!(reason.is_approval());

        let (text, details) = hold_columns(Some(&reason));
        assert_eq!(text.as_deref(), Some("Hold for Approval: margins"));
        assert_eq!(details.unwrap()["attachments"][0], "a.stl");
    }
}
