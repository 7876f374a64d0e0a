use std::sync::Arc;

use labflow_core::engine::WorkflowEngine;
use labflow_events::EventBus;

use crate::config::ServerConfig;
use crate::functions::FunctionsClient;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable: everything is behind `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, used for health checks.
    pub pool: labflow_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Workflow operations over the configured store.
    pub engine: WorkflowEngine,
    /// Change notifications for the WebSocket feed and status history.
    pub event_bus: Arc<EventBus>,
    pub functions: Arc<FunctionsClient>,
}
