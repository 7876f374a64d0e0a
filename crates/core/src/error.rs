use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} with id {id} not found (it may have been deleted)")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing required data: {0}")]
    MissingRequiredData(String),

    #[error(
        "Cannot {action} {entity} {id}: current status is '{current}'. Allowed actions: {}",
        format_allowed(.allowed)
    )]
    InvalidTransition {
        entity: &'static str,
        id: DbId,
        current: String,
        action: String,
        allowed: Vec<String>,
    },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Lab script must be completed before adding {kind} information (lab script {lab_script_id} is '{status}')")]
    LabScriptIncomplete {
        lab_script_id: DbId,
        kind: &'static str,
        status: String,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_allowed(allowed: &[String]) -> String {
    if allowed.is_empty() {
        "none".to_string()
    } else {
        allowed.join(", ")
    }
}
