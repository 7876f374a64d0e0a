pub mod admin;
pub mod images;
pub mod lab_scripts;
pub mod manufacturing;
pub mod patients;
pub mod report_cards;

use labflow_core::engine::Transition;
use labflow_core::types::{DbId, UserId};
use labflow_core::workflow::WorkflowEnum;
use labflow_events::{ChangeEvent, StatusChange};
use serde::Serialize;

use crate::state::AppState;

/// Publish a `status_changed` event when a transition actually applied.
/// Idempotent no-ops publish nothing.
pub(crate) fn publish_transition<T, S>(
    state: &AppState,
    table: &str,
    row_id: DbId,
    stage: Option<&str>,
    action: &str,
    actor: UserId,
    transition: &Transition<T, S>,
) where
    T: Serialize,
    S: WorkflowEnum,
{
    if let Transition::Applied { record, from, to } = transition {
        let change = StatusChange {
            stage: stage.map(str::to_string),
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
            action: action.to_string(),
        };
        state.event_bus.publish(
            ChangeEvent::status_changed(table, row_id, change)
                .with_actor(actor)
                .with_row(record),
        );
    }
}
