// src/config/mod.rs

//! Campaign configuration.
//!
//! - `model.rs` maps the TOML file onto serde types.
//! - `loader.rs` reads a file from disk.
//! - `validate.rs` turns a `RawConfigFile` into a checked `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    BuildConfig, ConfigFile, InstancesSection, MonitorSection, ProjectSection, RawConfigFile,
    RunSection,
};
