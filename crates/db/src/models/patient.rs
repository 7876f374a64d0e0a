//! Patient rows.

use chrono::NaiveDate;
use labflow_core::patient::Patient;
use labflow_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `patients` table.
#[derive(Debug, Clone, FromRow)]
pub struct PatientRow {
    pub id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

impl From<PatientRow> for Patient {
    fn from(row: PatientRow) -> Self {
        Patient {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            phone: row.phone,
            email: row.email,
            created_at: row.created_at,
        }
    }
}
