use std::collections::HashSet;

use dashmap::DashMap;

use super::types::ProcessSample;

/// Last sample per PID, the base for the next delta.
///
/// The map is sharded and locked internally, so one history can be shared by
/// samplers running on several threads. Entries are only replaced by new
/// samples of the same PID; vanished PIDs stay until the caller removes them.
#[derive(Debug, Default)]
pub struct ProcessHistory {
    samples: DashMap<u32, ProcessSample>,
}

impl ProcessHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the last sample of `pid`.
    pub fn get(&self, pid: u32) -> Option<ProcessSample> {
        self.samples.get(&pid).map(|sample| sample.clone())
    }

    /// Stores `sample` as the latest one of its PID.
    pub fn insert(&self, sample: ProcessSample) {
        self.samples.insert(sample.identity.pid, sample);
    }

    pub fn remove(&self, pid: u32) -> Option<ProcessSample> {
        self.samples.remove(&pid).map(|(_, sample)| sample)
    }

    pub fn clear(&self) {
        self.samples.clear();
    }

    /// Drops every entry whose PID is not in `alive`.
    pub fn retain_pids(&self, alive: &[u32]) {
        let alive: HashSet<u32> = alive.iter().copied().collect();
        self.samples.retain(|pid, _| alive.contains(pid));
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
