use std::collections::HashSet;

use sysinfo::{ProcessesToUpdate, System};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("process table is inaccessible, no processes were enumerated")]
    ProcessTableUnavailable,
}

/// Contract for taking a snapshot of what is currently running. Kept as a
/// trait so the tracking loop can be driven by a scripted sampler in tests.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessSampler: Send + 'static {
    /// Lower-case base names of every currently running process. Best-effort:
    /// a process that disappears mid-enumeration is simply absent from the
    /// set. Fails only when enumeration as a whole produced nothing.
    fn sample(&mut self) -> Result<HashSet<String>, SampleError>;
}

/// [ProcessSampler] over the live OS process table.
pub struct SystemSampler {
    system: System,
}

impl SystemSampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSampler for SystemSampler {
    fn sample(&mut self) -> Result<HashSet<String>, SampleError> {
        self.system
            .refresh_processes(ProcessesToUpdate::All, true);

        let mut running = HashSet::new();
        for process in self.system.processes().values() {
            // Non-unicode names are lossily converted. Losing a character of
            // an exotic name beats dropping the process from the sample.
            running.insert(process.name().to_string_lossy().to_lowercase());
        }

        // We are always running, so an empty table means enumeration itself
        // failed. The caller treats this as "unknown state, retry next cycle".
        if running.is_empty() {
            return Err(SampleError::ProcessTableUnavailable);
        }
        Ok(running)
    }
}
