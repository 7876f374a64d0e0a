//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod lab_script_repo;
pub mod manufacturing_log_repo;
pub mod patient_repo;
pub mod report_card_repo;
pub mod status_event_repo;

pub use lab_script_repo::LabScriptRepo;
pub use manufacturing_log_repo::ManufacturingLogRepo;
pub use patient_repo::PatientRepo;
pub use report_card_repo::ReportCardRepo;
pub use status_event_repo::StatusEventRepo;
