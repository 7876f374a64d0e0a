//! Handlers for patients.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use labflow_core::patient::NewPatient;
use labflow_core::types::DbId;
use labflow_events::bus::TABLE_PATIENTS;
use labflow_events::ChangeEvent;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAuth;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/patients
pub async fn create_patient(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<NewPatient>,
) -> AppResult<impl IntoResponse> {
    let patient = state.engine.create_patient(&user.session(), &input).await?;

    state.event_bus.publish(
        ChangeEvent::created(TABLE_PATIENTS, patient.id)
            .with_actor(user.user_id)
            .with_row(&patient),
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: patient })))
}

/// GET /api/v1/patients
pub async fn list_patients(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let patients = state
        .engine
        .list_patients(params.limit(), params.offset())
        .await?;
    Ok(Json(DataResponse { data: patients }))
}

/// GET /api/v1/patients/{id}
pub async fn get_patient(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let patient = state.engine.patient(id).await?;
    Ok(Json(DataResponse { data: patient }))
}
