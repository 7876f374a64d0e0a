//! Repository for the `patients` table.

use labflow_core::patient::NewPatient;
use labflow_core::types::DbId;
use sqlx::PgPool;

use crate::models::patient::PatientRow;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, first_name, last_name, date_of_birth, phone, email, created_at";

pub struct PatientRepo;

impl PatientRepo {
    pub async fn create(pool: &PgPool, input: &NewPatient) -> Result<PatientRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO patients (first_name, last_name, date_of_birth, phone, email)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PatientRow>(&query)
            .bind(input.first_name.trim())
            .bind(input.last_name.trim())
            .bind(input.date_of_birth)
            .bind(&input.phone)
            .bind(&input.email)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<PatientRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM patients WHERE id = $1");
        sqlx::query_as::<_, PatientRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List patients alphabetically by last name.
    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PatientRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM patients
             ORDER BY last_name, first_name, id
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, PatientRow>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
