//! Handlers for the manufacturing stage chain of a lab script.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use labflow_core::manufacturing::{Stage, StageAction, StageCommand};
use labflow_core::types::DbId;
use labflow_events::bus::TABLE_MANUFACTURING_LOGS;
use serde::Deserialize;

use crate::error::AppResult;
use crate::handlers::lab_scripts::TransitionResult;
use crate::handlers::publish_transition;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StageTransitionRequest {
    pub action: String,
    /// Required for `hold`, rejected otherwise.
    pub reason: Option<String>,
}

/// GET /api/v1/lab-scripts/{id}/manufacturing
pub async fn get_manufacturing_log(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(lab_script_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let log = state.engine.manufacturing_log(lab_script_id).await?;
    Ok(Json(DataResponse { data: log }))
}

/// POST /api/v1/lab-scripts/{id}/manufacturing/{stage}/transitions
pub async fn transition_stage(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path((lab_script_id, stage)): Path<(DbId, String)>,
    Json(input): Json<StageTransitionRequest>,
) -> AppResult<impl IntoResponse> {
    let stage: Stage = stage.parse()?;
    let action: StageAction = input.action.trim().parse()?;
    let command = StageCommand::from_parts(action, input.reason.as_deref())?;

    let transition = state
        .engine
        .transition_stage(&user.session(), lab_script_id, stage, &command)
        .await?;

    publish_transition(
        &state,
        TABLE_MANUFACTURING_LOGS,
        transition.record().id,
        Some(stage.as_str()),
        action.as_str(),
        user.user_id,
        &transition,
    );

    let applied = transition.is_applied();
    Ok(Json(DataResponse {
        data: TransitionResult {
            record: transition.into_record(),
            applied,
        },
    }))
}
