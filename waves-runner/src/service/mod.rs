//! Service layer
//!
//! Services contain the business logic of the runner. They orchestrate
//! adaptors and repositories to move jobs through their lifecycle.
//!
//! All services are trait-based to enable testing and dependency injection.

mod lifecycle;

// Re-export traits
pub use lifecycle::LifecycleService;

// Re-export implementations
pub use lifecycle::StandardLifecycleService;

pub use lifecycle::{LifecycleError, StepOutcome};
