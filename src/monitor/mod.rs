// src/monitor/mod.rs

//! Memory-pressure watchdog.
//!
//! The watchdog runs next to the worker pool for the whole campaign. It only
//! observes: when system memory use crosses the threshold it logs the
//! largest resident processes so an operator can tell what is eating the
//! machine. It never kills anything.

pub mod probe;
pub mod watchdog;

pub use probe::{MemoryProbe, MemorySample, ProcessMemory, SysinfoProbe};
pub use watchdog::{Watchdog, WatchdogConfig, WatchdogStats};
