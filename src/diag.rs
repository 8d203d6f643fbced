//! Resource diagnostics logged around failed runs.

/// Host memory and load figures, preformatted for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSnapshot {
    /// Free/total memory summary.
    pub memory: String,
    /// Load average summary.
    pub load: String,
}

/// Capture a best-effort snapshot of memory and load.
///
/// Informational only; never fails and never influences run classification.
#[must_use]
pub fn resource_snapshot() -> ResourceSnapshot {
    ResourceSnapshot {
        memory: read_memory().unwrap_or_else(|| "unavailable".to_string()),
        load: read_load().unwrap_or_else(|| "unavailable".to_string()),
    }
}

#[cfg(target_os = "linux")]
fn read_memory() -> Option<String> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let field = |name: &str| {
        meminfo
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|kb| kb.parse::<u64>().ok())
    };
    let total = field("MemTotal:")?;
    let available = field("MemAvailable:")?;
    Some(format!(
        "{} MiB available of {} MiB",
        available / 1024,
        total / 1024
    ))
}

#[cfg(target_os = "linux")]
fn read_load() -> Option<String> {
    let loadavg = std::fs::read_to_string("/proc/loadavg").ok()?;
    let mut parts = loadavg.split_whitespace();
    let one = parts.next()?;
    let five = parts.next()?;
    let fifteen = parts.next()?;
    Some(format!("{one} {five} {fifteen}"))
}

#[cfg(not(target_os = "linux"))]
fn read_memory() -> Option<String> {
    None
}

#[cfg(not(target_os = "linux"))]
fn read_load() -> Option<String> {
    None
}
