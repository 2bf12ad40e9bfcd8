//! Core domain types
//!
//! Shared between the runner (which drives jobs) and the operator CLI.

pub mod history;
pub mod job;
pub mod param;
pub mod run_details;
pub mod status;

pub use history::JobHistory;
pub use job::{Job, JobInput, JobOutput};
pub use param::{CmdFormat, ParamDescriptor, ParamType, ParamValue};
pub use run_details::JobRunDetails;
pub use status::JobStatus;
