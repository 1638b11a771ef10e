//! Subcommand implementations.

pub mod admin;
pub mod jobs;
pub mod migrate;
