//! Rate and percentage math on pairs of counter readings.
//!
//! Percentages are fractions: `1.0` is one fully used CPU, or all of the host's
//! memory. Every derived value is rounded to four decimal places.

use std::time::Duration;

use serde::Serialize;

/// CPU utilisation derived from two readings of a cumulative CPU time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CpuPercent {
    /// CPU time used per wall time. Can exceed `1.0` on multi-core hosts.
    pub pct: f64,
    /// `pct` divided by the number of online CPUs, in `[0, 1]`.
    pub norm_pct: f64,
}

/// Rounds to four decimal places.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Per-second rate of a monotonic counter between two readings.
///
/// A counter that went backwards is clamped to a rate of zero. Returns `None`
/// if no time has elapsed.
///
/// ```
/// use std::time::Duration;
/// use host_telemetry::delta::rate;
///
/// assert_eq!(rate(100, 200, Duration::from_secs(2)), Some(50.0));
/// ```
pub fn rate(previous: u64, current: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(round4(current.saturating_sub(previous) as f64 / secs))
}

/// CPU utilisation from two readings of cumulative CPU time.
pub fn cpu_percent(
    previous: Duration,
    current: Duration,
    elapsed: Duration,
    num_cpus: usize,
) -> Option<CpuPercent> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    let pct = current.saturating_sub(previous).as_secs_f64() / secs;
    let norm_pct = pct / num_cpus.max(1) as f64;
    Some(CpuPercent {
        pct: round4(pct),
        norm_pct: round4(norm_pct),
    })
}

/// `part / whole`, or `None` when `whole` is zero.
pub fn ratio(part: u64, whole: u64) -> Option<f64> {
    (whole > 0).then(|| round4(part as f64 / whole as f64))
}
