use std::collections::HashSet;

use super::types::ProcessSample;

/// How many of the busiest processes to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IncludeTop {
    pub by_cpu: usize,
    pub by_memory: usize,
}

impl IncludeTop {
    pub fn is_enabled(&self) -> bool {
        self.by_cpu > 0 || self.by_memory > 0
    }
}

/// Keeps the `by_cpu` processes with the highest CPU percentage and the
/// `by_memory` ones with the largest RSS.
///
/// CPU picks come first, followed by memory picks not already selected. Ties
/// keep input order. A process without a CPU percentage ranks as zero.
/// Disabled selectors return `samples` unchanged.
pub fn select_top(samples: Vec<ProcessSample>, top: IncludeTop) -> Vec<ProcessSample> {
    if !top.is_enabled() {
        return samples;
    }

    let mut by_cpu: Vec<usize> = (0..samples.len()).collect();
    by_cpu.sort_by(|&a, &b| {
        let cpu = |i: usize| samples[i].cpu.pct.unwrap_or(0.0);
        cpu(b).total_cmp(&cpu(a))
    });
    let mut by_memory: Vec<usize> = (0..samples.len()).collect();
    by_memory.sort_by(|&a, &b| samples[b].memory.rss.cmp(&samples[a].memory.rss));

    let mut seen = HashSet::new();
    let picked: Vec<usize> = by_cpu
        .into_iter()
        .take(top.by_cpu)
        .chain(by_memory.into_iter().take(top.by_memory))
        .filter(|&i| {
            let identity = &samples[i].identity;
            seen.insert((identity.pid, identity.start_time))
        })
        .collect();

    let mut slots: Vec<Option<ProcessSample>> = samples.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::types::{CpuUsage, MemoryUsage, ProcessIdentity, ProcessState};
    use std::time::SystemTime;

    fn sample(pid: u32, cpu: Option<f64>, rss: u64) -> ProcessSample {
        ProcessSample {
            identity: ProcessIdentity {
                pid,
                name: format!("p{pid}"),
                state: ProcessState::Running,
                ppid: 1,
                pgid: pid,
                num_threads: 1,
                start_time: 10,
            },
            uid: None,
            cpu: CpuUsage {
                pct: cpu,
                ..Default::default()
            },
            memory: MemoryUsage {
                rss,
                ..Default::default()
            },
            args: Vec::new(),
            cmdline: String::new(),
            env: Default::default(),
            io: None,
            io_rate: None,
            network: None,
            cgroup: None,
            sample_time: SystemTime::UNIX_EPOCH,
        }
    }

    fn pids(samples: &[ProcessSample]) -> Vec<u32> {
        samples.iter().map(|s| s.identity.pid).collect()
    }

    #[test]
    fn test_union_of_cpu_and_memory_top() {
        // A and B lead on CPU, B and C on memory.
        let samples = vec![
            sample(4, Some(0.1), 10),
            sample(3, Some(0.2), 500),
            sample(1, Some(0.9), 20),
            sample(2, Some(0.5), 900),
        ];
        let top = select_top(samples, IncludeTop { by_cpu: 2, by_memory: 2 });
        assert_eq!(pids(&top), vec![1, 2, 3]);
    }

    #[test]
    fn test_disabled_returns_input() {
        let samples = vec![sample(2, None, 1), sample(1, Some(0.5), 2)];
        let top = select_top(samples, IncludeTop::default());
        assert_eq!(pids(&top), vec![2, 1]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let samples = vec![
            sample(7, None, 0),
            sample(8, Some(0.0), 0),
            sample(9, None, 0),
        ];
        let top = select_top(samples, IncludeTop { by_cpu: 2, by_memory: 0 });
        assert_eq!(pids(&top), vec![7, 8]);
    }

    #[test]
    fn test_memory_only() {
        let samples = vec![sample(1, Some(0.9), 1), sample(2, None, 3), sample(3, None, 2)];
        let top = select_top(samples, IncludeTop { by_cpu: 0, by_memory: 5 });
        assert_eq!(pids(&top), vec![2, 3, 1]);
    }
}
