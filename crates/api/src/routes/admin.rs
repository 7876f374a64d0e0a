use axum::routing::{delete, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// ```text
/// POST   /         create_user
/// DELETE /{id}     delete_user
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(admin::create_user))
        .route("/{id}", delete(admin::delete_user))
}
