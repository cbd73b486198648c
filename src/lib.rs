//! Port Alberni daily dashboard library
//!
//! The get-or-produce cache, the upstream feeds that run through it, and the
//! CLI plumbing, exposed for the binary and integration tests.

pub mod analytics;
pub mod cache;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod sources;
