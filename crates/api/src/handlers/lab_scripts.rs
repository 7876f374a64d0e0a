//! Handlers for lab scripts and their status workflow.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use labflow_core::error::CoreError;
use labflow_core::hold::{ApprovalHold, HoldReason};
use labflow_core::lab_script::{
    LabScript, LabScriptAction, LabScriptCommand, LabScriptStatus, NewLabScript,
};
use labflow_core::manufacturing::ManufacturingLog;
use labflow_core::store::LabScriptFilter;
use labflow_core::types::DbId;
use labflow_events::bus::{TABLE_LAB_SCRIPTS, TABLE_MANUFACTURING_LOGS};
use labflow_events::ChangeEvent;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::publish_transition;
use crate::middleware::rbac::RequireAuth;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// A lab script together with the actions legal from its current status.
#[derive(Debug, Serialize)]
pub struct LabScriptView {
    #[serde(flatten)]
    pub lab_script: LabScript,
    pub available_actions: Vec<LabScriptAction>,
}

impl From<LabScript> for LabScriptView {
    fn from(lab_script: LabScript) -> Self {
        let available_actions = lab_script.available_actions();
        Self {
            lab_script,
            available_actions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedLabScript {
    pub lab_script: LabScriptView,
    pub manufacturing_log: ManufacturingLog,
}

#[derive(Debug, Serialize)]
pub struct TransitionResult<T: Serialize> {
    #[serde(flatten)]
    pub record: T,
    /// `false` when the request was an idempotent no-op.
    pub applied: bool,
}

#[derive(Debug, Deserialize)]
pub struct LabScriptListParams {
    pub status: Option<String>,
    pub patient_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LabScriptListParams {
    fn page(&self) -> PaginationParams {
        PaginationParams {
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Body of `POST /lab-scripts/{id}/transitions`.
///
/// `reason`, `comment`, `design_link` and `attachments` only apply to the
/// `hold` action. `reason` may also be given in the combined
/// `"<label>: <comment>"` form.
#[derive(Debug, Default, Deserialize)]
pub struct LabScriptTransitionRequest {
    pub action: String,
    pub reason: Option<String>,
    pub comment: Option<String>,
    pub design_link: Option<String>,
    pub attachments: Option<Vec<String>>,
    pub notes: Option<String>,
}

impl LabScriptTransitionRequest {
    fn has_hold_details(&self) -> bool {
        self.reason.is_some()
            || self.comment.is_some()
            || self.design_link.is_some()
            || self.attachments.is_some()
    }

    /// Validate the request into a command.
    pub fn into_command(self) -> Result<LabScriptCommand, CoreError> {
        let action: LabScriptAction = self.action.trim().parse()?;
        if action != LabScriptAction::Hold {
            if self.has_hold_details() {
                return Err(CoreError::Validation(format!(
                    "Hold details are only accepted with the 'hold' action, not '{action}'"
                )));
            }
            return LabScriptCommand::from_parts(action, None);
        }

        let approval = if self.design_link.is_some() || self.attachments.is_some() {
            Some(ApprovalHold {
                design_link: self.design_link.unwrap_or_default(),
                attachments: self.attachments.unwrap_or_default(),
            })
        } else {
            None
        };
        let reason = self.reason.unwrap_or_default();
        let hold = match self.comment.as_deref() {
            Some(comment) => HoldReason::new(&reason, Some(comment), approval)?,
            None => HoldReason::parse(&reason, approval)?,
        };
        LabScriptCommand::from_parts(action, Some(hold))
    }
}

/// POST /api/v1/lab-scripts
///
/// Creates the lab script in `pending` together with its manufacturing log.
pub async fn create_lab_script(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(input): Json<NewLabScript>,
) -> AppResult<impl IntoResponse> {
    let (script, log) = state
        .engine
        .create_lab_script(&user.session(), &input)
        .await?;

    state.event_bus.publish(
        ChangeEvent::created(TABLE_LAB_SCRIPTS, script.id)
            .with_actor(user.user_id)
            .with_row(&script),
    );
    state.event_bus.publish(
        ChangeEvent::created(TABLE_MANUFACTURING_LOGS, log.id)
            .with_actor(user.user_id)
            .with_row(&log),
    );

    let data = CreatedLabScript {
        lab_script: script.into(),
        manufacturing_log: log,
    };
    Ok((StatusCode::CREATED, Json(DataResponse { data })))
}

/// GET /api/v1/lab-scripts?status=&patient_id=&limit=&offset=
pub async fn list_lab_scripts(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<LabScriptListParams>,
) -> AppResult<impl IntoResponse> {
    let status = params
        .status
        .as_deref()
        .map(str::parse::<LabScriptStatus>)
        .transpose()?;
    let page = params.page();
    let filter = LabScriptFilter {
        status,
        patient_id: params.patient_id,
        limit: page.limit(),
        offset: page.offset(),
    };
    let scripts: Vec<LabScriptView> = state
        .engine
        .list_lab_scripts(&filter)
        .await?
        .into_iter()
        .map(LabScriptView::from)
        .collect();
    Ok(Json(DataResponse { data: scripts }))
}

/// GET /api/v1/lab-scripts/{id}
pub async fn get_lab_script(
    RequireAuth(_user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let script = state.engine.lab_script(id).await?;
    Ok(Json(DataResponse {
        data: LabScriptView::from(script),
    }))
}

/// POST /api/v1/lab-scripts/{id}/transitions
///
/// Applies one workflow action. Re-sending an idempotent action returns the
/// stored lab script with `applied: false`.
pub async fn transition_lab_script(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    Json(input): Json<LabScriptTransitionRequest>,
) -> AppResult<impl IntoResponse> {
    let notes = input.notes.clone();
    let command = input.into_command()?;
    let action = command.action();

    let transition = state
        .engine
        .transition_lab_script(&user.session(), id, &command, notes.as_deref())
        .await?;

    publish_transition(
        &state,
        TABLE_LAB_SCRIPTS,
        id,
        None,
        action.as_str(),
        user.user_id,
        &transition,
    );

    let applied = transition.is_applied();
    Ok(Json(DataResponse {
        data: TransitionResult {
            record: LabScriptView::from(transition.into_record()),
            applied,
        },
    }))
}
