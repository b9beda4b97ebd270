use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xp::exec::{ExecutionRequest, ExecutorBackend, TaskOutcome, TaskReport};

/// What the fake does with every request.
#[derive(Debug, Clone, Copy)]
pub enum FakeBehaviour {
    /// Sleep, then report a finished task with this exit code.
    Exit { code: i32, delay: Duration },
    /// Report a spawn failure straight away.
    FailToSpawn,
}

/// A fake executor that:
/// - records every request it was given
/// - tracks how many requests were in flight at once
/// - answers according to its [`FakeBehaviour`] without touching the OS.
///
/// Clones share their counters, so a test can keep one and hand the other
/// to the orchestrator.
#[derive(Clone)]
pub struct FakeExecutor {
    behaviour: FakeBehaviour,
    executed: Arc<Mutex<Vec<ExecutionRequest>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl FakeExecutor {
    pub fn new(behaviour: FakeBehaviour) -> Self {
        Self {
            behaviour,
            executed: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn exiting(code: i32, delay: Duration) -> Self {
        Self::new(FakeBehaviour::Exit { code, delay })
    }

    pub fn requests(&self) -> Vec<ExecutionRequest> {
        self.executed.lock().unwrap().clone()
    }

    pub fn executions(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl ExecutorBackend for FakeExecutor {
    fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Pin<Box<dyn Future<Output = TaskReport> + Send + '_>> {
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.executed.lock().unwrap().push(request.clone());

            let report = match self.behaviour {
                FakeBehaviour::Exit { code, delay } => {
                    tokio::time::sleep(delay).await;
                    TaskReport::Finished(TaskOutcome {
                        build_name: request.campaign.clone(),
                        instance_name: request.task.instance_name(),
                        instance_path: request.task.instance_path.clone(),
                        command: request.command.clone(),
                        wall_time_seconds: delay.as_secs_f64(),
                        exit_code: code,
                    })
                }
                FakeBehaviour::FailToSpawn => TaskReport::Abandoned {
                    reason: format!("spawning process for task '{}'", request.name),
                },
            };

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            report
        })
    }
}
