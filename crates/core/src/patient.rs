//! Patients that lab scripts are written for.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::lab_script::{validate_length, validate_required_text, MAX_NAME_LENGTH};
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: DbId,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl NewPatient {
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_required_text("first_name", &self.first_name, MAX_NAME_LENGTH)?;
        validate_required_text("last_name", &self.last_name, MAX_NAME_LENGTH)?;
        if let Some(phone) = &self.phone {
            validate_length("phone", phone, 32)?;
        }
        if let Some(email) = &self.email {
            if !validator::ValidateEmail::validate_email(email) {
                return Err(CoreError::Validation(format!(
                    "Invalid email address '{email}'"
                )));
            }
        }
        Ok(())
    }
}
