//! Repository layer
//!
//! Repositories abstract the job store owned by the web layer. They provide
//! simple persistence operations without any business logic.
//!
//! All repositories are trait-based to enable testing and mocking.

mod fs;
mod jobs;

use std::sync::Arc;

use crate::config::Config;

// Re-export traits
pub use jobs::{JobRepository, RepositoryError, Timestamp, is_expired};

// Re-export implementations
pub use fs::FsJobRepository;
pub use jobs::HttpJobRepository;

/// Repository selected by the runner configuration
pub fn from_config(config: &Config) -> Arc<dyn JobRepository> {
    match &config.job_store_url {
        Some(url) => Arc::new(HttpJobRepository::new(url.clone())),
        None => Arc::new(FsJobRepository::new(&config.data_root)),
    }
}
