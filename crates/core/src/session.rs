//! Explicit caller identity passed into every workflow operation.

use crate::error::CoreError;
use crate::types::UserId;

/// The authenticated caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub role: String,
}

impl Session {
    pub fn new(user_id: UserId, role: impl Into<String>) -> Self {
        Self {
            user_id,
            role: role.into(),
        }
    }

    /// Reject the caller unless their role is one of `allowed`.
    pub fn require_any_role(&self, allowed: &[&str], operation: &str) -> Result<(), CoreError> {
        if allowed.contains(&self.role.as_str()) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "Role '{}' may not {operation}. Required: {}",
                self.role,
                allowed.join(" or ")
            )))
        }
    }
}
