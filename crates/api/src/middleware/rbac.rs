//! Role-based access control extractors.
//!
//! Fine-grained per-action role checks live in the workflow engine; these
//! extractors guard whole endpoints.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use labflow_core::error::CoreError;
use labflow_core::roles::{validate_role, ROLE_ADMIN};

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != ROLE_ADMIN {
            return Err(AppError::Core(CoreError::Forbidden(
                "Admin role required".into(),
            )));
        }
        Ok(RequireAdmin(user))
    }
}

/// Requires an authenticated caller holding one of the known staff roles.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        validate_role(&user.role).map_err(|_| {
            AppError::Core(CoreError::Forbidden(format!(
                "Role '{}' has no access to the lab workflow",
                user.role
            )))
        })?;
        Ok(RequireAuth(user))
    }
}
