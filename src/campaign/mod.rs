// src/campaign/mod.rs

//! Collaborators around the orchestrator.
//!
//! - [`setup`] resolves project and instance locations, runs builds and
//!   expands instance classes.
//! - [`parse`] invokes the per-task parser.
//! - [`aggregate`] gathers per-task `res.csv` rows into one table.

pub mod aggregate;
pub mod parse;
pub mod setup;

pub use aggregate::{CsvAggregation, gather_results};
pub use parse::{parse_and_gather, parse_task_dir, parser_command};
pub use setup::{
    INSTANCES_CLONE_DIR, PROJECT_CLONE_DIR, build_all, resolve_instances, resolve_location,
};
