use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use labflow_core::error::CoreError;
use serde_json::json;

use crate::functions::FunctionsError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for workflow errors and [`FunctionsError`] for the
/// external function calls.
///
/// Every variant renders as `{ "error": message, "code": CODE }`; invalid
/// transitions add a `details` object with the current status and the
/// actions that are allowed from it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Functions(#[from] FunctionsError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, code, message) = match &self {
            AppError::Core(core) => match core {
                CoreError::NotFound { .. } => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND", core.to_string())
                }
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::MissingRequiredData(msg) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "MISSING_REQUIRED_DATA",
                    msg.clone(),
                ),
                CoreError::InvalidTransition {
                    current, allowed, ..
                } => {
                    details = Some(json!({
                        "current_status": current,
                        "allowed_actions": allowed,
                    }));
                    (StatusCode::CONFLICT, "INVALID_TRANSITION", core.to_string())
                }
                CoreError::PreconditionFailed(msg) => {
                    (StatusCode::CONFLICT, "PRECONDITION_FAILED", msg.clone())
                }
                CoreError::LabScriptIncomplete { .. } => (
                    StatusCode::CONFLICT,
                    "LAB_SCRIPT_INCOMPLETE",
                    core.to_string(),
                ),
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Unauthorized(msg) => {
                    (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone())
                }
                CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
                CoreError::Persistence(msg) => {
                    tracing::error!(error = %msg, "Persistence failure");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "PERSISTENCE_FAILURE",
                        "The change could not be saved. Please try again".to_string(),
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        INTERNAL_MESSAGE.to_string(),
                    )
                }
            },

            AppError::Functions(err) => classify_functions_error(err),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(details) = details {
            body["details"] = details;
        }

        (status, axum::Json(body)).into_response()
    }
}

/// Client errors from a function keep their status and message; anything
/// else becomes a sanitized 502.
fn classify_functions_error(err: &FunctionsError) -> (StatusCode, &'static str, String) {
    match err {
        FunctionsError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            err.to_string(),
        ),
        FunctionsError::Api { status, .. } if (400..500).contains(status) => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
            let message = err
                .upstream_message()
                .unwrap_or_else(|| "The request was rejected by the upstream service".into());
            (status, "UPSTREAM_REJECTED", message)
        }
        other => {
            tracing::error!(error = %other, "Function call failed");
            (
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_ERROR",
                "The upstream service failed to handle the request".to_string(),
            )
        }
    }
}
