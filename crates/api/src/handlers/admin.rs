//! Admin-only staff account management, delegated to the user functions.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use labflow_core::staff::NewStaffUser;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/admin/users
pub async fn create_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<NewStaffUser>,
) -> AppResult<impl IntoResponse> {
    input.check()?;

    let created = state.functions.create_user(&input).await?;

    tracing::info!(
        admin_id = %admin.user_id,
        user_id = %created.user_id,
        role = %input.role,
        "Staff account created"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: created })))
}

/// DELETE /api/v1/admin/users/{id}
pub async fn delete_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.functions.delete_user(user_id).await?;

    tracing::info!(admin_id = %admin.user_id, user_id = %user_id, "Staff account deleted");

    Ok(StatusCode::NO_CONTENT)
}
