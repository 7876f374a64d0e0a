//! Well-known role name constants.
//!
//! These must match the seed data in `20260301000001_create_roles_table.sql`.

use crate::error::CoreError;

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_TECHNICIAN: &str = "technician";
pub const ROLE_CLINICIAN: &str = "clinician";

/// All roles a staff account may hold.
pub const VALID_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_TECHNICIAN, ROLE_CLINICIAN];

/// Roles allowed to drive lab script and manufacturing work.
pub const LAB_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_TECHNICIAN];

/// Roles allowed to record clinical feedback.
pub const CLINICAL_ROLES: &[&str] = &[ROLE_ADMIN, ROLE_CLINICIAN];

/// Validate that a role string is one of the known roles.
pub fn validate_role(role: &str) -> Result<(), CoreError> {
    if VALID_ROLES.contains(&role) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid role '{role}'. Must be one of: {}",
            VALID_ROLES.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_accepted() {
        for role in VALID_ROLES {
            assert!(validate_role(role).is_ok());
        }
    }

    #[test]
    fn unknown_role_rejected() {
        let msg = validate_role("owner").unwrap_err().to_string();
        assert!(msg.contains("owner"));
    }
}
