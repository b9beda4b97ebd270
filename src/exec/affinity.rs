// src/exec/affinity.rs

//! Round-robin assignment of physical CPU cores to tasks.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

/// Hands out physical core ids in an endlessly repeating round-robin.
///
/// One id is consumed per task at submission time. An allocator without
/// cores never assigns anything and tasks run unpinned.
#[derive(Debug, Default)]
pub struct CoreAllocator {
    cores: Vec<usize>,
    cursor: AtomicUsize,
}

impl CoreAllocator {
    pub fn new(cores: Vec<usize>) -> Self {
        Self {
            cores,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Allocator over the host's physical cores.
    ///
    /// Disabled when the topology cannot be read or `taskset` is not on
    /// `PATH`.
    pub fn detect() -> Self {
        if !binary_on_path("taskset") {
            info!("taskset not found on PATH; tasks will run unpinned");
            return Self::disabled();
        }
        match physical_cores() {
            Some(cores) if !cores.is_empty() => {
                info!(?cores, "pinning tasks to physical cores");
                Self::new(cores)
            }
            _ => {
                info!("physical core topology unavailable; tasks will run unpinned");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.cores.is_empty()
    }

    pub fn cores(&self) -> &[usize] {
        &self.cores
    }

    /// Take the next core id, or `None` when pinning is disabled.
    pub fn next_core(&self) -> Option<usize> {
        if self.cores.is_empty() {
            return None;
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(self.cores[slot % self.cores.len()])
    }
}

/// Physical core identifiers, one logical CPU per core.
///
/// For every core the lowest-numbered hardware thread is returned, so SMT
/// siblings are never both handed out before every core was used once.
#[cfg(target_os = "linux")]
pub fn physical_cores() -> Option<Vec<usize>> {
    physical_cores_from_sysfs(Path::new("/sys/devices/system/cpu"))
}

#[cfg(not(target_os = "linux"))]
pub fn physical_cores() -> Option<Vec<usize>> {
    None
}

/// Read core topology from a sysfs-like tree rooted at `cpu_root`.
pub fn physical_cores_from_sysfs(cpu_root: &Path) -> Option<Vec<usize>> {
    let entries = std::fs::read_dir(cpu_root).ok()?;
    let mut cores = Vec::new();

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();
        let Some(index) = name.strip_prefix("cpu") else {
            continue;
        };
        if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }

        let siblings = entry.path().join("topology").join("thread_siblings_list");
        let Ok(raw) = std::fs::read_to_string(&siblings) else {
            debug!(path = %siblings.display(), "no sibling list; skipping cpu");
            continue;
        };
        if let Some(first) = parse_cpu_list(&raw).into_iter().min() {
            cores.push(first);
        }
    }

    cores.sort_unstable();
    cores.dedup();
    if cores.is_empty() { None } else { Some(cores) }
}

/// Parse a kernel cpu list such as `0-3,8,10-11`.
pub fn parse_cpu_list(raw: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in raw.trim().split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.trim().parse::<usize>(), hi.trim().parse::<usize>()) {
                    cpus.extend(lo..=hi);
                }
            }
            None => {
                if let Ok(cpu) = part.trim().parse::<usize>() {
                    cpus.push(cpu);
                }
            }
        }
    }
    cpus
}

fn binary_on_path(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_wraps_around() {
        let alloc = CoreAllocator::new(vec![0, 1, 2]);
        let seq: Vec<usize> = (0..7).filter_map(|_| alloc.next_core()).collect();
        assert_eq!(seq, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn disabled_allocator_assigns_nothing() {
        let alloc = CoreAllocator::disabled();
        assert!(!alloc.is_enabled());
        assert_eq!(alloc.next_core(), None);
    }

    #[test]
    fn parses_kernel_cpu_lists() {
        assert_eq!(parse_cpu_list("0-2,8\n"), vec![0, 1, 2, 8]);
        assert_eq!(parse_cpu_list("4"), vec![4]);
        assert!(parse_cpu_list("").is_empty());
    }

    #[test]
    fn sysfs_topology_collapses_smt_siblings() {
        let root = tempfile::tempdir().unwrap();
        for (cpu, siblings) in [(0, "0,2"), (1, "1,3"), (2, "0,2"), (3, "1,3")] {
            let topo = root.path().join(format!("cpu{cpu}")).join("topology");
            std::fs::create_dir_all(&topo).unwrap();
            std::fs::write(topo.join("thread_siblings_list"), siblings).unwrap();
        }
        std::fs::create_dir_all(root.path().join("cpufreq")).unwrap();

        assert_eq!(physical_cores_from_sysfs(root.path()), Some(vec![0, 1]));
    }
}
