// src/monitor/watchdog.rs

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::probe::{MemoryProbe, MemorySample, ProcessMemory};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_THRESHOLD_PERCENT: f64 = 80.0;
pub const DEFAULT_TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    pub interval: Duration,
    pub threshold_percent: f64,
    pub top_n: usize,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// What the watchdog saw over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchdogStats {
    pub samples: usize,
    pub alerts: usize,
}

/// Handle to the running watchdog loop.
///
/// Dropping the handle does not stop the loop; call [`Watchdog::stop`].
pub struct Watchdog {
    token: CancellationToken,
    handle: JoinHandle<WatchdogStats>,
}

impl Watchdog {
    /// Start sampling immediately, then every `config.interval`.
    pub fn spawn(probe: Box<dyn MemoryProbe>, config: WatchdogConfig) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(watch_loop(probe, config, token.clone()));
        Self { token, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Signal the loop and wait for it to exit.
    ///
    /// Returns `None` if the loop panicked.
    pub async fn stop(self) -> Option<WatchdogStats> {
        self.token.cancel();
        match self.handle.await {
            Ok(stats) => {
                debug!(?stats, "memory watchdog stopped");
                Some(stats)
            }
            Err(e) => {
                error!(error = %e, "memory watchdog terminated abnormally");
                None
            }
        }
    }
}

async fn watch_loop(
    mut probe: Box<dyn MemoryProbe>,
    config: WatchdogConfig,
    token: CancellationToken,
) -> WatchdogStats {
    let mut stats = WatchdogStats::default();
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        interval_s = config.interval.as_secs_f64(),
        threshold_percent = config.threshold_percent,
        "memory watchdog started"
    );

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let top_n = config.top_n;
        let threshold = config.threshold_percent;
        let sampled = tokio::task::spawn_blocking(move || {
            let sample = probe.memory();
            let top = if sample.percent() > threshold {
                Some(probe.top_processes(top_n))
            } else {
                None
            };
            (probe, sample, top)
        })
        .await;

        let (returned, sample, top) = match sampled {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "memory probe panicked; watchdog stopping");
                break;
            }
        };
        probe = returned;
        stats.samples += 1;

        match top {
            Some(top) => {
                stats.alerts += 1;
                log_pressure(&sample, &top);
            }
            None => debug!(used_percent = sample.percent(), "memory sample"),
        }
    }

    stats
}

fn log_pressure(sample: &MemorySample, top: &[ProcessMemory]) {
    warn!(
        used_percent = %format!("{:.1}", sample.percent()),
        used_mb = sample.used_bytes / 1024 / 1024,
        total_mb = sample.total_bytes / 1024 / 1024,
        "high memory usage"
    );
    for (rank, p) in top.iter().enumerate() {
        warn!(
            rank = rank + 1,
            pid = p.pid,
            name = %p.name,
            rss_mb = p.resident_bytes / 1024 / 1024,
            "top memory consumer"
        );
    }
}
