// src/monitor/probe.rs

use sysinfo::System;

/// System-wide memory usage at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl MemorySample {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 * 100.0 / self.total_bytes as f64
    }
}

/// One process and its resident set size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessMemory {
    pub pid: u32,
    pub name: String,
    pub resident_bytes: u64,
}

/// Source of memory statistics for the watchdog.
///
/// Calls may block for a while (walking the process table), so the watchdog
/// runs them on the blocking pool.
pub trait MemoryProbe: Send + 'static {
    fn memory(&mut self) -> MemorySample;

    /// The `n` processes with the largest resident memory, largest first.
    fn top_processes(&mut self, n: usize) -> Vec<ProcessMemory>;
}

/// Probe backed by `sysinfo`.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn memory(&mut self) -> MemorySample {
        self.system.refresh_memory();
        MemorySample {
            used_bytes: self.system.used_memory(),
            total_bytes: self.system.total_memory(),
        }
    }

    fn top_processes(&mut self, n: usize) -> Vec<ProcessMemory> {
        self.system.refresh_processes();
        let mut procs: Vec<ProcessMemory> = self
            .system
            .processes()
            .iter()
            .map(|(pid, p)| ProcessMemory {
                pid: pid.as_u32(),
                name: p.name().to_string(),
                resident_bytes: p.memory(),
            })
            .collect();
        procs.sort_by(|a, b| b.resident_bytes.cmp(&a.resident_bytes));
        procs.truncate(n);
        procs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_empty_total() {
        let s = MemorySample {
            used_bytes: 10,
            total_bytes: 0,
        };
        assert_eq!(s.percent(), 0.0);
    }

    #[test]
    fn percent_of_used_memory() {
        let s = MemorySample {
            used_bytes: 850,
            total_bytes: 1000,
        };
        assert!((s.percent() - 85.0).abs() < 1e-9);
    }

    #[test]
    fn sysinfo_reports_some_memory() {
        let mut probe = SysinfoProbe::new();
        assert!(probe.memory().total_bytes > 0);
        assert!(probe.top_processes(3).len() <= 3);
    }
}
