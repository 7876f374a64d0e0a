//! Inputs for the externally provisioned operations: staff accounts and
//! generated images.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::roles::validate_role;

/// Image categories the generator knows how to produce.
pub const IMAGE_CATEGORIES: &[&str] = &["avatar", "appliance", "case-study"];

/// Highest accepted image index within a category.
pub const MAX_IMAGE_INDEX: u32 = 99;

/// Request to create a staff account. Serialized in the shape the
/// `create-user` function expects.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewStaffUser {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 12, message = "must be at least 12 characters long"))]
    pub password: String,
    pub role: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub last_name: String,
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub phone: Option<String>,
}

impl NewStaffUser {
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate().map_err(validation_error)?;
        validate_role(&self.role)
    }
}

/// Request to generate an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRequest {
    pub category: String,
    pub index: u32,
}

impl ImageRequest {
    pub fn check(&self) -> Result<(), CoreError> {
        if !IMAGE_CATEGORIES.contains(&self.category.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid image category '{}'. Must be one of: {}",
                self.category,
                IMAGE_CATEGORIES.join(", ")
            )));
        }
        if self.index > MAX_IMAGE_INDEX {
            return Err(CoreError::Validation(format!(
                "Image index must be between 0 and {MAX_IMAGE_INDEX}"
            )));
        }
        Ok(())
    }
}

/// Flatten `validator` errors into one message, fields sorted by name.
fn validation_error(errors: validator::ValidationErrors) -> CoreError {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let msg = errs
                .iter()
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "is invalid".to_string());
            format!("{field} {msg}")
        })
        .collect();
    parts.sort();
    CoreError::Validation(parts.join("; "))
}
