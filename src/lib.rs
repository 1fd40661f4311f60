//! Mend library crate
//!
//! Exposes the healing pipeline so embedders and integration tests can drive
//! runs with their own test-execution and commit collaborators.

pub mod classify;
pub mod config;
pub mod extract;
pub mod git_ops;
pub mod heal;
pub mod imports;
pub mod model;
pub mod parse;
pub mod report;
pub mod runner;
pub mod scan;
pub mod snippet;
pub mod strategy;
pub mod trace;
pub mod util;
