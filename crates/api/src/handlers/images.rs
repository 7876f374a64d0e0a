use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use labflow_core::staff::ImageRequest;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/images/generate
pub async fn generate_image(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<ImageRequest>,
) -> AppResult<impl IntoResponse> {
    input.check()?;

    let image = state.functions.generate_image(&input).await?;
    tracing::debug!(user_id = %user.user_id, category = %input.category, "Image generated");

    Ok(Json(DataResponse { data: image }))
}
