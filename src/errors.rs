// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::task::TemplateError;

#[derive(Error, Debug)]
pub enum XpError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Duplicate task name in campaign: {0}")]
    DuplicateTask(String),

    #[error("Campaign has no tasks")]
    EmptyCampaign,

    #[error("Build '{name}' failed: {detail}")]
    Build { name: String, detail: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, XpError>;
