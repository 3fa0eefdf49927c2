use std::time::Duration;

/// Pause inserted between two region batches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingInterval {
    pub interval: Duration,
    /// The raw interval was zero or negative and got clamped
    pub degenerate: bool,
}

/// Spread `count` batches over `total`: `total / count - 1` seconds each,
/// clamped at zero. A single batch never waits, so it is never degenerate.
pub fn pacing_interval(total: Duration, count: usize) -> PacingInterval {
    if count == 0 {
        return PacingInterval { interval: Duration::ZERO, degenerate: false };
    }

    match (total.as_secs() / count as u64).checked_sub(1) {
        Some(secs) if secs > 0 => PacingInterval { interval: Duration::from_secs(secs), degenerate: false },
        _ => PacingInterval { interval: Duration::ZERO, degenerate: count > 1 },
    }
}
