pub mod admin;
pub mod health;
pub mod images;
pub mod lab_scripts;
pub mod patients;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ws/changes                                      change feed (WebSocket)
///
/// /patients                                        list, create
/// /patients/{id}                                   get
///
/// /lab-scripts                                     list, create
/// /lab-scripts/{id}                                get (+ available actions)
/// /lab-scripts/{id}/transitions                    apply workflow action (POST)
/// /lab-scripts/{id}/manufacturing                  manufacturing log
/// /lab-scripts/{id}/manufacturing/{stage}/transitions   apply stage action (POST)
/// /lab-scripts/{id}/report-card                    design + clinical info
/// /lab-scripts/{id}/design-info                    upsert (PUT)
/// /lab-scripts/{id}/design-info/editor             gate check
/// /lab-scripts/{id}/clinical-info                  upsert (PUT)
/// /lab-scripts/{id}/clinical-info/editor           gate check
///
/// /admin/users                                     create (admin only)
/// /admin/users/{id}                                delete (admin only)
///
/// /images/generate                                 generate image (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws/changes", get(ws::changes::changes_handler))
        .nest("/patients", patients::router())
        .nest("/lab-scripts", lab_scripts::router())
        .nest("/admin/users", admin::router())
        .nest("/images", images::router())
}
