//! Lab script routes, including the manufacturing and report card routes
//! scoped under a single lab script.

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::{lab_scripts, manufacturing, report_cards};
use crate::state::AppState;

/// ```text
/// GET    /                                      list_lab_scripts
/// POST   /                                      create_lab_script
/// GET    /{id}                                  get_lab_script
/// POST   /{id}/transitions                      transition_lab_script
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(lab_scripts::list_lab_scripts).post(lab_scripts::create_lab_script),
        )
        .route("/{id}", get(lab_scripts::get_lab_script))
        .route("/{id}/transitions", post(lab_scripts::transition_lab_script))
        .merge(manufacturing_router())
        .merge(report_card_router())
}

/// ```text
/// GET    /{id}/manufacturing                          get_manufacturing_log
/// POST   /{id}/manufacturing/{stage}/transitions      transition_stage
/// ```
fn manufacturing_router() -> Router<AppState> {
    Router::new()
        .route(
            "/{id}/manufacturing",
            get(manufacturing::get_manufacturing_log),
        )
        .route(
            "/{id}/manufacturing/{stage}/transitions",
            post(manufacturing::transition_stage),
        )
}

/// ```text
/// GET    /{id}/report-card                  get_report_card
/// PUT    /{id}/design-info                  put_design_info
/// GET    /{id}/design-info/editor           open_design_editor
/// PUT    /{id}/clinical-info                put_clinical_info
/// GET    /{id}/clinical-info/editor         open_clinical_editor
/// ```
fn report_card_router() -> Router<AppState> {
    Router::new()
        .route("/{id}/report-card", get(report_cards::get_report_card))
        .route("/{id}/design-info", put(report_cards::put_design_info))
        .route(
            "/{id}/design-info/editor",
            get(report_cards::open_design_editor),
        )
        .route("/{id}/clinical-info", put(report_cards::put_clinical_info))
        .route(
            "/{id}/clinical-info/editor",
            get(report_cards::open_clinical_editor),
        )
}
