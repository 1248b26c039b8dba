//! Tracker configuration.

use log::warn;
use std::env;
use std::str::FromStr;

/// Log tracker statistics after every pass.
pub const DEBUG_STATS: u32 = 1;
/// Log every reclaimed object.
pub const DEBUG_RECLAIMED: u32 = 1 << 1;
/// Log every phantom notification as it is queued.
pub const DEBUG_NOTIFY: u32 = 1 << 2;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Registrations since the last pass after which `collect_if_needed`
    /// runs a pass.
    ///
    /// Default: 700
    pub registration_threshold: usize,

    /// Estimated live payload bytes at or above which `collect` treats the
    /// tracker as under memory pressure, making soft-only objects reclaimable.
    ///
    /// Default: 64MB
    pub pressure_threshold_bytes: usize,

    /// Bitwise OR of the `DEBUG_*` flags.
    pub debug_flags: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            registration_threshold: 700,
            pressure_threshold_bytes: 64 * 1024 * 1024,
            debug_flags: 0,
        }
    }
}

impl TrackerConfig {
    pub fn with_registration_threshold(mut self, threshold: usize) -> Self {
        self.registration_threshold = threshold;
        self
    }

    pub fn with_pressure_threshold(mut self, bytes: usize) -> Self {
        self.pressure_threshold_bytes = bytes;
        self
    }

    pub fn with_debug_flags(mut self, flags: u32) -> Self {
        self.debug_flags = flags;
        self
    }

    /// Defaults overridden by `REF_TRACKER_THRESHOLD`,
    /// `REF_TRACKER_PRESSURE_BYTES` and `REF_TRACKER_DEBUG`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(threshold) = read_var("REF_TRACKER_THRESHOLD") {
            config.registration_threshold = threshold;
        }
        if let Some(bytes) = read_var("REF_TRACKER_PRESSURE_BYTES") {
            config.pressure_threshold_bytes = bytes;
        }
        if let Some(flags) = read_var("REF_TRACKER_DEBUG") {
            config.debug_flags = flags;
        }

        config
    }
}

fn read_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {name}={raw:?}: not a valid number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.registration_threshold, 700);
        assert_eq!(config.pressure_threshold_bytes, 64 * 1024 * 1024);
        assert_eq!(config.debug_flags, 0);
    }

    #[test]
    fn test_builder() {
        let config = TrackerConfig::default()
            .with_registration_threshold(10)
            .with_pressure_threshold(1024)
            .with_debug_flags(DEBUG_STATS | DEBUG_NOTIFY);

        assert_eq!(config.registration_threshold, 10);
        assert_eq!(config.pressure_threshold_bytes, 1024);
        assert_eq!(config.debug_flags & DEBUG_RECLAIMED, 0);
        assert_ne!(config.debug_flags & DEBUG_NOTIFY, 0);
    }

    #[test]
    fn test_from_env_without_vars() {
        // Only asserts on a variable no other test sets.
        let config = TrackerConfig::from_env();
        if env::var("REF_TRACKER_THRESHOLD").is_err() {
            assert_eq!(config.registration_threshold, 700);
        }
    }
}
