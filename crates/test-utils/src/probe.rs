use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use xp::monitor::{MemoryProbe, MemorySample, ProcessMemory};

/// Memory probe replaying a fixed usage percentage.
///
/// The shared counter lets a test check that sampling stopped once the
/// campaign returned.
#[derive(Clone)]
pub struct ScriptedProbe {
    percent_used: u64,
    samples: Arc<AtomicUsize>,
}

impl ScriptedProbe {
    pub fn new(percent_used: u64) -> Self {
        Self {
            percent_used,
            samples: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn samples(&self) -> usize {
        self.samples.load(Ordering::SeqCst)
    }
}

impl MemoryProbe for ScriptedProbe {
    fn memory(&mut self) -> MemorySample {
        self.samples.fetch_add(1, Ordering::SeqCst);
        MemorySample {
            used_bytes: self.percent_used,
            total_bytes: 100,
        }
    }

    fn top_processes(&mut self, n: usize) -> Vec<ProcessMemory> {
        (0..n as u32)
            .map(|pid| ProcessMemory {
                pid,
                name: format!("fake-{pid}"),
                resident_bytes: 1024 * 1024,
            })
            .collect()
    }
}
