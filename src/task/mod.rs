// src/task/mod.rs

//! Task descriptors and the command formatter.
//!
//! - [`descriptor`] defines [`TaskDescriptor`], its derived directory name and
//!   parameter sweeps.
//! - [`template`] parses and renders run templates strictly.

pub mod descriptor;
pub mod template;

pub use descriptor::{
    RESERVED_PLACEHOLDERS, TaskDescriptor, check_unique, sanitize_component, sweep,
};
pub use template::{CommandTemplate, TemplateError};
