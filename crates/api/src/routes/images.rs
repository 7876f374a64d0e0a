use axum::routing::post;
use axum::Router;

use crate::handlers::images;
use crate::state::AppState;

/// ```text
/// POST   /generate     generate_image
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(images::generate_image))
}
