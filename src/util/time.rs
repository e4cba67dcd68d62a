//! Time utilities for game simulation

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Get current Unix timestamp in seconds
pub fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Tick rate configuration
pub const SIMULATION_TPS: u32 = 60; // 60 ticks per second
pub const SNAPSHOT_TPS: u32 = 60; // 60 snapshots per second

/// Period of a loop running `rate` times per second
pub fn interval_for(rate: u32) -> Duration {
    Duration::from_micros(1_000_000 / rate.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_for_rates() {
        assert_eq!(interval_for(60), Duration::from_micros(16_666));
        assert_eq!(interval_for(1), Duration::from_secs(1));
        // zero is clamped instead of dividing by zero
        assert_eq!(interval_for(0), Duration::from_secs(1));
    }
}
