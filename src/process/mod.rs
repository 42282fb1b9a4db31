//! Process enumeration, filtering and sampling.
//!
//! A [`Sampler`] reads processes through a [`PlatformProcessSource`], attaches
//! their cgroup accounting and turns cumulative CPU time into percentages by
//! comparing against the previous sample kept in a [`ProcessHistory`].
//!
//! ```no_run
//! use host_telemetry::process::{ProcessFilter, ProcessHistory, Sampler, SamplerConfig};
//!
//! let sampler = Sampler::new(SamplerConfig::default()).unwrap();
//! let filter = ProcessFilter::new([".*"]).unwrap();
//! let history = ProcessHistory::new();
//!
//! // The first tick only fills the history.
//! sampler.sample_all(&filter, &history, None).unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! for sample in sampler.sample_all(&filter, &history, None).unwrap() {
//!     println!("{} {:?}", sample.identity.name, sample.cpu.pct);
//! }
//! ```

mod error;
mod filter;
mod history;
mod linux;
mod net;
mod procfs;
mod sampler;
mod source;
mod top;
mod types;

pub use error::{Error, Result};
pub use filter::ProcessFilter;
pub use history::ProcessHistory;
pub use linux::ProcfsSource;
pub use net::{InterfaceStat, NetworkCounters};
pub use sampler::{Sampled, Sampler, SamplerConfig};
pub use source::PlatformProcessSource;
pub use top::{IncludeTop, select_top};
pub use types::{
    CpuUsage, ExtendedMetrics, IoCounters, IoRate, MemoryUsage, ProcessIdentity, ProcessSample,
    ProcessState,
};
