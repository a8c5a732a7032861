// Best-effort resource sampling around a child execution

use crate::executor::types::ResourceUsage;
use std::time::Duration;

/// Cumulative usage of reaped children at one instant
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildUsage {
    cpu: Duration,
    max_rss_kb: i64,
}

/// Sample reaped-children usage; `None` where unsupported
pub fn snapshot() -> Option<ChildUsage> {
    #[cfg(unix)]
    {
        use nix::sys::resource::{UsageWho, getrusage};

        let usage = getrusage(UsageWho::RUSAGE_CHILDREN).ok()?;
        let cpu = timeval_duration(usage.user_time()) + timeval_duration(usage.system_time());
        Some(ChildUsage {
            cpu,
            max_rss_kb: i64::from(usage.max_rss()),
        })
    }

    #[cfg(not(unix))]
    {
        None
    }
}

#[cfg(unix)]
fn timeval_duration(tv: nix::sys::time::TimeVal) -> Duration {
    let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec()).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros)
}

/// Usage attributable to the child reaped since `before`
pub fn usage_since(before: Option<ChildUsage>, wall: Duration) -> Option<ResourceUsage> {
    let after = snapshot();
    let cpu_percent = match (before, after) {
        (Some(b), Some(a)) if !wall.is_zero() => {
            let cpu = a.cpu.saturating_sub(b.cpu);
            Some(cpu.as_secs_f64() / wall.as_secs_f64() * 100.0)
        }
        _ => None,
    };
    // ru_maxrss is a high-water mark over every child reaped so far
    let memory_mb = after
        .filter(|a| a.max_rss_kb > 0)
        .map(|a| a.max_rss_kb as f64 / 1024.0);

    let usage = ResourceUsage {
        cpu_percent,
        memory_mb,
        num_threads: thread_count(),
    };
    (!usage.is_empty()).then_some(usage)
}

/// Threads of the engine process, Linux only
fn thread_count() -> Option<u32> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|v| v.trim().parse().ok())
}
