//! Single-flight guard keyed by report id.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

use gridwatch_core::ReportId;

/// Serializes jobs that target the same report. Jobs for different reports never wait
/// on each other.
#[derive(Debug, Default)]
pub struct ReportLocks {
    busy: Mutex<HashSet<ReportId>>,
    released: Condvar,
}

/// Held while a job owns its report; releases on drop.
#[derive(Debug)]
pub struct ReportGuard<'a> {
    locks: &'a ReportLocks,
    id: ReportId,
}

impl ReportLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until no other job holds `id`, then hold it.
    pub fn acquire(&self, id: ReportId) -> ReportGuard<'_> {
        let mut busy = self.busy_set();
        while busy.contains(&id) {
            busy = self
                .released
                .wait(busy)
                .unwrap_or_else(|poison| poison.into_inner());
        }
        busy.insert(id);
        ReportGuard { locks: self, id }
    }

    #[cfg(test)]
    fn is_held(&self, id: ReportId) -> bool {
        self.busy_set().contains(&id)
    }

    fn busy_set(&self) -> MutexGuard<'_, HashSet<ReportId>> {
        // The set is only mutated by insert/remove; a panic elsewhere cannot leave it torn.
        self.busy.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for ReportGuard<'_> {
    fn drop(&mut self) {
        self.locks.busy_set().remove(&self.id);
        self.locks.released.notify_all();
    }
}
