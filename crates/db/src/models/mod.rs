//! Row structs and their conversions into domain records.
//!
//! Each submodule contains a `FromRow` struct matching the table columns.
//! Status columns are read as text and parsed into the closed domain enums
//! on conversion, so an unknown value surfaces as an error instead of
//! leaking into the workflow.

pub mod lab_script;
pub mod manufacturing_log;
pub mod patient;
pub mod report_card;
pub mod status_event;
