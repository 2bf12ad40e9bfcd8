//! Scheduler layer for the runner
//!
//! Long running loops of the runner: the job queue daemon reconciling
//! pending jobs with their backends, and the purge daemon removing jobs past
//! their retention window.

pub mod purge;
pub mod queue;

pub use purge::PurgeDaemon;
pub use queue::{JobQueueDaemon, TickSummary};
