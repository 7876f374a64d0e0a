//! Handlers for report cards: design and clinical information, both gated
//! on the lab script being completed.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use labflow_core::report_card::{ClinicalInfoInput, DesignInfoInput, InfoKind};
use labflow_core::types::DbId;
use labflow_events::bus::{TABLE_CLINICAL_INFO, TABLE_DESIGN_INFO};
use labflow_events::ChangeEvent;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/lab-scripts/{id}/report-card
pub async fn get_report_card(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(lab_script_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let card = state.engine.report_card(lab_script_id).await?;
    Ok(Json(DataResponse { data: card }))
}

/// GET /api/v1/lab-scripts/{id}/design-info/editor
///
/// Succeeds with the current report card when the caller may edit design
/// information now; 409 `LAB_SCRIPT_INCOMPLETE` otherwise.
pub async fn open_design_editor(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lab_script_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let card = state
        .engine
        .open_info_editor(&user.session(), lab_script_id, InfoKind::Design)
        .await?;
    Ok(Json(DataResponse { data: card }))
}

/// GET /api/v1/lab-scripts/{id}/clinical-info/editor
pub async fn open_clinical_editor(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lab_script_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let card = state
        .engine
        .open_info_editor(&user.session(), lab_script_id, InfoKind::Clinical)
        .await?;
    Ok(Json(DataResponse { data: card }))
}

/// PUT /api/v1/lab-scripts/{id}/design-info
pub async fn put_design_info(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lab_script_id): Path<DbId>,
    Json(input): Json<DesignInfoInput>,
) -> AppResult<impl IntoResponse> {
    let info = state
        .engine
        .save_design_info(&user.session(), lab_script_id, &input)
        .await?;

    state.event_bus.publish(
        ChangeEvent::updated(TABLE_DESIGN_INFO, info.id)
            .with_actor(user.user_id)
            .with_row(&info),
    );

    Ok(Json(DataResponse { data: info }))
}

/// PUT /api/v1/lab-scripts/{id}/clinical-info
pub async fn put_clinical_info(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(lab_script_id): Path<DbId>,
    Json(input): Json<ClinicalInfoInput>,
) -> AppResult<impl IntoResponse> {
    let info = state
        .engine
        .save_clinical_info(&user.session(), lab_script_id, &input)
        .await?;

    state.event_bus.publish(
        ChangeEvent::updated(TABLE_CLINICAL_INFO, info.id)
            .with_actor(user.user_id)
            .with_row(&info),
    );

    Ok(Json(DataResponse { data: info }))
}
