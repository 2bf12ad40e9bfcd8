//! Waves Core
//!
//! Core types for the WAVES job execution layer.
//!
//! This crate contains:
//! - Domain types: jobs, their history, parameters and run details
//! - The command line compiler
//! - DTOs exchanged with the job store and stored on jobs

pub mod command;
pub mod domain;
pub mod dto;
