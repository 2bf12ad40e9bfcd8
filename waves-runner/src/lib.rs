//! WAVES runner library
//!
//! Job execution layer of WAVES:
//! - Adaptors: execution backends (local shell, SSH, cluster schedulers)
//! - Repositories: job store access (filesystem or the web layer over HTTP)
//! - Services: the job lifecycle state machine
//! - Scheduler: reconciliation and purge daemons
//!
//! Used by the `waves-runner` daemon and the `waves` operator CLI.

pub mod adaptor;
pub mod config;
pub mod crypto;
pub mod repository;
pub mod scheduler;
pub mod service;
