//! Change notification for the lab workflow.
//!
//! - [`bus`]: in-process broadcast of committed row changes.
//! - [`feed`]: per-table and per-row filtered subscriptions.
//! - [`history`]: background recorder for applied status transitions.

pub mod bus;
pub mod feed;
pub mod history;

pub use bus::{ChangeEvent, ChangeKind, EventBus, StatusChange};
pub use feed::{ChangeFilter, ChangeSubscription};
pub use history::StatusHistoryRecorder;
