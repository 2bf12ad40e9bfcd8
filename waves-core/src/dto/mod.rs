//! Data Transfer Objects
//!
//! Small serializable envelopes exchanged with the job store.

pub mod adaptor;
pub mod job;
