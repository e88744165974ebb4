//! Command-line front end for apiscout: configuration, bundle validation,
//! graded reporting and terminal output.

pub mod bundle;
pub mod commands;
pub mod config;
pub mod output;
pub mod report;
