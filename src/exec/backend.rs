// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The orchestrator talks to an `ExecutorBackend` instead of spawning
//! processes itself. Production uses [`ProcessExecutor`]; tests can provide a
//! backend that records requests and answers without touching the OS.
//!
//! [`ProcessExecutor`]: super::ProcessExecutor

use std::future::Future;
use std::pin::Pin;

use super::{ExecutionRequest, TaskReport};

/// Trait abstracting how a single task is executed.
///
/// Implementations are shared by every worker of a campaign, so they take
/// `&self` and must be `Sync`. Failures are reported through [`TaskReport`],
/// never by panicking or returning an error.
pub trait ExecutorBackend: Send + Sync + 'static {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Pin<Box<dyn Future<Output = TaskReport> + Send + '_>>;
}
