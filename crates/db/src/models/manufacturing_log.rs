//! Manufacturing log rows.

use labflow_core::error::CoreError;
use labflow_core::manufacturing::{ManufacturingLog, ManufacturingMethod, StageState};
use labflow_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `manufacturing_logs` table.
#[derive(Debug, Clone, FromRow)]
pub struct ManufacturingLogRow {
    pub id: DbId,
    pub lab_script_id: DbId,
    pub method: Option<String>,
    pub manufacturing_status: String,
    pub manufacturing_started_at: Option<Timestamp>,
    pub manufacturing_completed_at: Option<Timestamp>,
    pub manufacturing_hold_at: Option<Timestamp>,
    pub manufacturing_hold_reason: Option<String>,
    pub sintering_status: String,
    pub sintering_started_at: Option<Timestamp>,
    pub sintering_completed_at: Option<Timestamp>,
    pub sintering_hold_at: Option<Timestamp>,
    pub sintering_hold_reason: Option<String>,
    pub miyo_status: String,
    pub miyo_started_at: Option<Timestamp>,
    pub miyo_completed_at: Option<Timestamp>,
    pub miyo_hold_at: Option<Timestamp>,
    pub miyo_hold_reason: Option<String>,
    pub inspection_status: String,
    pub inspection_started_at: Option<Timestamp>,
    pub inspection_completed_at: Option<Timestamp>,
    pub inspection_hold_at: Option<Timestamp>,
    pub inspection_hold_reason: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

fn stage_state(
    status: String,
    started_at: Option<Timestamp>,
    completed_at: Option<Timestamp>,
    hold_at: Option<Timestamp>,
    hold_reason: Option<String>,
) -> Result<StageState, CoreError> {
    Ok(StageState {
        status: status.parse()?,
        started_at,
        completed_at,
        hold_at,
        hold_reason,
    })
}

impl TryFrom<ManufacturingLogRow> for ManufacturingLog {
    type Error = CoreError;

    fn try_from(row: ManufacturingLogRow) -> Result<Self, Self::Error> {
        Ok(ManufacturingLog {
            id: row.id,
            lab_script_id: row.lab_script_id,
            method: row.method.as_deref().map(str::parse::<ManufacturingMethod>).transpose()?,
            manufacturing: stage_state(
                row.manufacturing_status,
                row.manufacturing_started_at,
                row.manufacturing_completed_at,
                row.manufacturing_hold_at,
                row.manufacturing_hold_reason,
            )?,
            sintering: stage_state(
                row.sintering_status,
                row.sintering_started_at,
                row.sintering_completed_at,
                row.sintering_hold_at,
                row.sintering_hold_reason,
            )?,
            miyo: stage_state(
                row.miyo_status,
                row.miyo_started_at,
                row.miyo_completed_at,
                row.miyo_hold_at,
                row.miyo_hold_reason,
            )?,
            inspection: stage_state(
                row.inspection_status,
                row.inspection_started_at,
                row.inspection_completed_at,
                row.inspection_hold_at,
                row.inspection_hold_reason,
            )?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
