//! Tests for `AppError` → HTTP response mapping. No server needed; these
//! call `IntoResponse` directly.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use labflow_api::error::AppError;
use labflow_api::functions::FunctionsError;
use labflow_core::error::CoreError;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn not_found_returns_404_and_mentions_deletion() {
    let (status, json) = error_to_response(AppError::Core(CoreError::NotFound {
        entity: "LabScript",
        id: 42,
    }))
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(
        json["error"],
        "LabScript with id 42 not found (it may have been deleted)"
    );
}

#[tokio::test]
async fn invalid_transition_returns_409_with_details() {
    let (status, json) = error_to_response(AppError::Core(CoreError::InvalidTransition {
        entity: "lab script",
        id: 5,
        current: "paused".into(),
        action: "complete".into(),
        allowed: vec!["resume".into()],
    }))
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INVALID_TRANSITION");
    assert_eq!(json["details"]["current_status"], "paused");
    assert_eq!(json["details"]["allowed_actions"][0], "resume");
}

#[tokio::test]
async fn missing_required_data_returns_422() {
    let (status, json) = error_to_response(AppError::Core(CoreError::MissingRequiredData(
        "A hold reason is required".into(),
    )))
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["code"], "MISSING_REQUIRED_DATA");
}

#[tokio::test]
async fn conflict_and_precondition_are_distinct_409s() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Conflict("changed".into()))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::PreconditionFailed("nope".into()))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "PRECONDITION_FAILED");
}

#[tokio::test]
async fn persistence_failure_is_503_and_sanitized() {
    let (status, json) = error_to_response(AppError::Core(CoreError::Persistence(
        "connection refused at 10.0.0.7:5432".into(),
    )))
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "PERSISTENCE_FAILURE");
    assert!(!json.to_string().contains("10.0.0.7"));
}

#[tokio::test]
async fn internal_error_is_sanitized() {
    let (status, json) = error_to_response(AppError::Core(CoreError::Internal(
        "secret credentials".into(),
    )))
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn upstream_client_error_keeps_status_and_message() {
    let (status, json) = error_to_response(AppError::Functions(FunctionsError::Api {
        function: "create-user",
        status: 409,
        body: r#"{"error":"Email already registered"}"#.into(),
    }))
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "UPSTREAM_REJECTED");
    assert_eq!(json["error"], "Email already registered");
}

#[tokio::test]
async fn upstream_server_error_becomes_502() {
    let (status, json) = error_to_response(AppError::Functions(FunctionsError::Api {
        function: "generate-image",
        status: 500,
        body: "stack trace".into(),
    }))
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!json.to_string().contains("stack trace"));
}
