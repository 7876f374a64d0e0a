use axum::routing::get;
use axum::Router;

use crate::handlers::patients;
use crate::state::AppState;

/// ```text
/// GET    /         list_patients
/// POST   /         create_patient
/// GET    /{id}     get_patient
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(patients::list_patients).post(patients::create_patient),
        )
        .route("/{id}", get(patients::get_patient))
}
