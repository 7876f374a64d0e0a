//! Report cards: design and clinical information attached to a lab script.
//!
//! Both sub-records may only be opened, created or edited once the parent lab
//! script is `completed`. Callers must check against a freshly read lab
//! script, never a cached copy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lab_script::{
    validate_length, LabScript, LabScriptStatus, MAX_NAME_LENGTH, MAX_NOTES_LENGTH,
};
use crate::roles::{CLINICAL_ROLES, LAB_ROLES};
use crate::types::{DbId, Timestamp, UserId};

/// Maximum length of a design link.
pub const MAX_LINK_LENGTH: usize = 2_048;

/// Which half of a report card an operation touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoKind {
    Design,
    Clinical,
}

impl InfoKind {
    pub fn label(self) -> &'static str {
        match self {
            InfoKind::Design => "design",
            InfoKind::Clinical => "clinical",
        }
    }

    /// Roles allowed to open or write this kind of information.
    pub fn required_roles(self) -> &'static [&'static str] {
        match self {
            InfoKind::Design => LAB_ROLES,
            InfoKind::Clinical => CLINICAL_ROLES,
        }
    }
}

/// Reject with [`CoreError::LabScriptIncomplete`] unless `script` is completed.
pub fn ensure_lab_script_completed(script: &LabScript, kind: InfoKind) -> Result<(), CoreError> {
    if script.status == LabScriptStatus::Completed {
        return Ok(());
    }
    Err(CoreError::LabScriptIncomplete {
        lab_script_id: script.id,
        kind: kind.label(),
        status: script.status.to_string(),
    })
}

/* --------------------------------------------------------------------------
Records
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignInfo {
    pub id: DbId,
    pub lab_script_id: DbId,
    pub designer_name: Option<String>,
    pub design_software: Option<String>,
    pub design_link: Option<String>,
    pub notes: Option<String>,
    pub updated_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalInfo {
    pub id: DbId,
    pub lab_script_id: DbId,
    pub delivery_date: Option<NaiveDate>,
    pub fit_assessment: Option<String>,
    pub occlusion_notes: Option<String>,
    pub patient_feedback: Option<String>,
    pub notes: Option<String>,
    pub updated_by: UserId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Upsert payload for design information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DesignInfoInput {
    pub designer_name: Option<String>,
    pub design_software: Option<String>,
    pub design_link: Option<String>,
    pub notes: Option<String>,
}

impl DesignInfoInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_optional("designer_name", &self.designer_name, MAX_NAME_LENGTH)?;
        check_optional("design_software", &self.design_software, MAX_NAME_LENGTH)?;
        check_optional("design_link", &self.design_link, MAX_LINK_LENGTH)?;
        check_optional("notes", &self.notes, MAX_NOTES_LENGTH)
    }
}

/// Upsert payload for clinical information.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClinicalInfoInput {
    pub delivery_date: Option<NaiveDate>,
    pub fit_assessment: Option<String>,
    pub occlusion_notes: Option<String>,
    pub patient_feedback: Option<String>,
    pub notes: Option<String>,
}

impl ClinicalInfoInput {
    pub fn validate(&self) -> Result<(), CoreError> {
        check_optional("fit_assessment", &self.fit_assessment, MAX_NAME_LENGTH)?;
        check_optional("occlusion_notes", &self.occlusion_notes, MAX_NOTES_LENGTH)?;
        check_optional("patient_feedback", &self.patient_feedback, MAX_NOTES_LENGTH)?;
        check_optional("notes", &self.notes, MAX_NOTES_LENGTH)
    }
}

fn check_optional(field: &str, value: &Option<String>, max: usize) -> Result<(), CoreError> {
    match value {
        Some(v) => validate_length(field, v, max),
        None => Ok(()),
    }
}

/// Derived status of a report card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCardStatus {
    Pending,
    Completed,
}

/// Both halves of a lab script's report card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCard {
    pub lab_script_id: DbId,
    pub status: ReportCardStatus,
    pub design_info: Option<DesignInfo>,
    pub clinical_info: Option<ClinicalInfo>,
}

impl ReportCard {
    pub fn new(
        lab_script_id: DbId,
        design_info: Option<DesignInfo>,
        clinical_info: Option<ClinicalInfo>,
    ) -> Self {
        let status = if design_info.is_some() && clinical_info.is_some() {
            ReportCardStatus::Completed
        } else {
            ReportCardStatus::Pending
        };
        Self {
            lab_script_id,
            status,
            design_info,
            clinical_info,
        }
    }
}
