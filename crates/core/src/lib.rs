pub mod engine;
pub mod error;
pub mod hold;
pub mod lab_script;
pub mod manufacturing;
pub mod memory;
pub mod patient;
pub mod report_card;
pub mod roles;
pub mod session;
pub mod staff;
pub mod store;
pub mod types;
pub mod workflow;
