use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use labflow_core::error::CoreError;
use labflow_core::roles::validate_role;
use labflow_core::types::DbId;
use labflow_events::{ChangeFilter, ChangeSubscription};
use serde::Deserialize;

use crate::error::AppError;
use crate::middleware::auth::{authenticate, AuthUser};
use crate::state::AppState;

/// Interval between heartbeat pings.
const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// `?table=&row_id=&token=`. Browsers cannot set headers on a WebSocket
/// handshake, so the access token travels in the query string.
#[derive(Debug, Deserialize)]
pub struct ChangesParams {
    pub table: String,
    pub row_id: Option<DbId>,
    pub token: Option<String>,
}

/// GET /api/v1/ws/changes
///
/// Authenticates and validates the filter before upgrading, so bad
/// requests get a normal JSON error instead of a dropped socket.
pub async fn changes_handler(
    State(state): State<AppState>,
    Query(params): Query<ChangesParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let (user, subscription) = match open_subscription(&state, &params) {
        Ok(opened) => opened,
        Err(e) => return e.into_response(),
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| stream_changes(socket, user, subscription)),
        Err(rejection) => rejection.into_response(),
    }
}

fn open_subscription(
    state: &AppState,
    params: &ChangesParams,
) -> Result<(AuthUser, ChangeSubscription), AppError> {
    let token = params.token.as_deref().ok_or_else(|| {
        AppError::Core(CoreError::Unauthorized("Missing token parameter".into()))
    })?;
    let user = authenticate(token, state)?;
    validate_role(&user.role)
        .map_err(|_| AppError::Core(CoreError::Forbidden("Unknown role".into())))?;

    let filter = ChangeFilter::new(&params.table, params.row_id)?;
    Ok((
        user,
        ChangeSubscription::new(filter, state.event_bus.subscribe()),
    ))
}

/// Forward matching changes to the socket until either side goes away.
async fn stream_changes(socket: WebSocket, user: AuthUser, mut subscription: ChangeSubscription) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(
        conn_id = %conn_id,
        user_id = %user.user_id,
        table = %subscription.filter().table,
        row_id = ?subscription.filter().row_id,
        "Change feed connected"
    );

    let (mut sink, mut stream) = socket.split();
    let mut heartbeat = tokio::time::interval(Duration::from_secs(HEARTBEAT_INTERVAL_SECS));

    loop {
        tokio::select! {
            event = subscription.next() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(conn_id = %conn_id, error = %e, "Failed to serialize change");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    tracing::debug!(conn_id = %conn_id, "Change feed sink closed");
                    break;
                }
            }
            inbound = stream.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(Message::Pong(_))) => {
                    tracing::trace!(conn_id = %conn_id, "Pong received");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "Change feed receive error");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!(conn_id = %conn_id, "Change feed disconnected");
}
