//! Repository for the `design_info` and `clinical_info` tables.
//!
//! Writes are gated in SQL: the upsert only inserts a row while the parent
//! lab script is `completed`, so a lab script reopened between the check
//! and the write cannot gain report-card data.

use labflow_core::lab_script::LabScriptStatus;
use labflow_core::report_card::{ClinicalInfoInput, DesignInfoInput};
use labflow_core::types::{DbId, UserId};
use sqlx::PgPool;

use crate::models::report_card::{ClinicalInfoRow, DesignInfoRow};

const DESIGN_COLUMNS: &str = "id, lab_script_id, designer_name, design_software, design_link, \
                              notes, updated_by, created_at, updated_at";

const CLINICAL_COLUMNS: &str = "id, lab_script_id, delivery_date, fit_assessment, \
                                occlusion_notes, patient_feedback, notes, updated_by, \
                                created_at, updated_at";

pub struct ReportCardRepo;

impl ReportCardRepo {
    pub async fn find_design_info(
        pool: &PgPool,
        lab_script_id: DbId,
    ) -> Result<Option<DesignInfoRow>, sqlx::Error> {
        let query = format!("SELECT {DESIGN_COLUMNS} FROM design_info WHERE lab_script_id = $1");
        sqlx::query_as::<_, DesignInfoRow>(&query)
            .bind(lab_script_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_clinical_info(
        pool: &PgPool,
        lab_script_id: DbId,
    ) -> Result<Option<ClinicalInfoRow>, sqlx::Error> {
        let query =
            format!("SELECT {CLINICAL_COLUMNS} FROM clinical_info WHERE lab_script_id = $1");
        sqlx::query_as::<_, ClinicalInfoRow>(&query)
            .bind(lab_script_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace design info. Returns `None` when the lab script is
    /// missing or not `completed`.
    pub async fn upsert_design_info_if_completed(
        pool: &PgPool,
        lab_script_id: DbId,
        input: &DesignInfoInput,
        actor: UserId,
    ) -> Result<Option<DesignInfoRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO design_info
                (lab_script_id, designer_name, design_software, design_link, notes, updated_by)
             SELECT $1, $2, $3, $4, $5, $6
             WHERE EXISTS (SELECT 1 FROM lab_scripts WHERE id = $1 AND status = $7)
             ON CONFLICT (lab_script_id) DO UPDATE SET
                designer_name = EXCLUDED.designer_name,
                design_software = EXCLUDED.design_software,
                design_link = EXCLUDED.design_link,
                notes = EXCLUDED.notes,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
             RETURNING {DESIGN_COLUMNS}"
        );
        sqlx::query_as::<_, DesignInfoRow>(&query)
            .bind(lab_script_id)
            .bind(&input.designer_name)
            .bind(&input.design_software)
            .bind(&input.design_link)
            .bind(&input.notes)
            .bind(actor)
            .bind(LabScriptStatus::Completed.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Insert or replace clinical info. Returns `None` when the lab script is
    /// missing or not `completed`.
    pub async fn upsert_clinical_info_if_completed(
        pool: &PgPool,
        lab_script_id: DbId,
        input: &ClinicalInfoInput,
        actor: UserId,
    ) -> Result<Option<ClinicalInfoRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO clinical_info
                (lab_script_id, delivery_date, fit_assessment, occlusion_notes,
                 patient_feedback, notes, updated_by)
             SELECT $1, $2, $3, $4, $5, $6, $7
             WHERE EXISTS (SELECT 1 FROM lab_scripts WHERE id = $1 AND status = $8)
             ON CONFLICT (lab_script_id) DO UPDATE SET
                delivery_date = EXCLUDED.delivery_date,
                fit_assessment = EXCLUDED.fit_assessment,
                occlusion_notes = EXCLUDED.occlusion_notes,
                patient_feedback = EXCLUDED.patient_feedback,
                notes = EXCLUDED.notes,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
             RETURNING {CLINICAL_COLUMNS}"
        );
        sqlx::query_as::<_, ClinicalInfoRow>(&query)
            .bind(lab_script_id)
            .bind(input.delivery_date)
            .bind(&input.fit_assessment)
            .bind(&input.occlusion_notes)
            .bind(&input.patient_feedback)
            .bind(&input.notes)
            .bind(actor)
            .bind(LabScriptStatus::Completed.as_str())
            .fetch_optional(pool)
            .await
    }
}
