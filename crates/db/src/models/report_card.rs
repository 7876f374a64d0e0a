//! Design info and clinical info rows.

use chrono::NaiveDate;
use labflow_core::report_card::{ClinicalInfo, DesignInfo};
use labflow_core::types::{DbId, Timestamp, UserId};
use sqlx::FromRow;

/// A row from the `design_info` table.
#[derive(Debug, Clone, FromRow)]
pub struct DesignInfoRow {
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

impl From<DesignInfoRow> for DesignInfo {
    fn from(row: DesignInfoRow) -> Self {
        DesignInfo {
            id: row.id,
            lab_script_id: row.lab_script_id,
            designer_name: row.designer_name,
            design_software: row.design_software,
            design_link: row.design_link,
            notes: row.notes,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row from the `clinical_info` table.
#[derive(Debug, Clone, FromRow)]
pub struct ClinicalInfoRow {
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

impl From<ClinicalInfoRow> for ClinicalInfo {
    fn from(row: ClinicalInfoRow) -> Self {
        ClinicalInfo {
            id: row.id,
            lab_script_id: row.lab_script_id,
            delivery_date: row.delivery_date,
            fit_assessment: row.fit_assessment,
            occlusion_notes: row.occlusion_notes,
            patient_feedback: row.patient_feedback,
            notes: row.notes,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
