//! Offline buffer configuration

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default log file name, resolved against the current directory
const DEFAULT_LOG_FILE: &str = "offline.log";

/// Default time between decision ticks (30 minutes)
const DEFAULT_TICK_INTERVAL_MS: u64 = 30 * 60 * 1000;

/// Default eviction threshold (10 MB)
const DEFAULT_SIZE_LIMIT_BYTES: u64 = 10_000_000;

/// Configuration for an [`OfflineBuffer`](super::OfflineBuffer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferConfig {
    /// Canonical log file location
    pub log_path: PathBuf,
    /// Time between decision ticks
    pub tick_interval: Duration,
    /// Run one decision cycle at construction instead of waiting a full interval
    pub replay_immediately: bool,
    /// Above this size an unreplayable log is discarded
    pub size_limit_bytes: u64,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            log_path: resolve_path(DEFAULT_LOG_FILE),
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            replay_immediately: false,
            size_limit_bytes: DEFAULT_SIZE_LIMIT_BYTES,
        }
    }
}

impl BufferConfig {
    /// Create config with a custom log path
    pub fn new<P: AsRef<Path>>(log_path: P) -> Self {
        Self {
            log_path: resolve_path(log_path),
            ..Default::default()
        }
    }

    /// Create config from environment variables.
    ///
    /// - `OFFGRID_LOG_PATH`: log file (relative paths are resolved against
    ///   the current directory)
    /// - `OFFGRID_TICK_INTERVAL_MS`: milliseconds between ticks
    /// - `OFFGRID_SIZE_LIMIT_BYTES`: eviction threshold
    /// - `OFFGRID_REPLAY_IMMEDIATELY`: `true`/`1` to decide at startup
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let defaults = Self::default();

        Self {
            log_path: lookup("OFFGRID_LOG_PATH")
                .map(resolve_path)
                .unwrap_or(defaults.log_path),
            tick_interval: lookup("OFFGRID_TICK_INTERVAL_MS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            replay_immediately: lookup("OFFGRID_REPLAY_IMMEDIATELY")
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.replay_immediately),
            size_limit_bytes: lookup("OFFGRID_SIZE_LIMIT_BYTES")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(defaults.size_limit_bytes),
        }
    }

    /// Set the tick interval
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Decide once at construction
    pub fn with_replay_immediately(mut self, replay_immediately: bool) -> Self {
        self.replay_immediately = replay_immediately;
        self
    }

    /// Set the eviction threshold
    pub fn with_size_limit_bytes(mut self, size_limit_bytes: u64) -> Self {
        self.size_limit_bytes = size_limit_bytes;
        self
    }
}

fn resolve_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    current_dir.join(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BufferConfig::default();
        assert!(config.log_path.is_absolute());
        assert!(config.log_path.ends_with("offline.log"));
        assert_eq!(config.tick_interval, Duration::from_secs(1800));
        assert!(!config.replay_immediately);
        assert_eq!(config.size_limit_bytes, 10_000_000);
    }

    #[test]
    fn test_builder_methods() {
        let config = BufferConfig::new("/var/spool/app.log")
            .with_tick_interval(Duration::from_millis(10))
            .with_replay_immediately(true)
            .with_size_limit_bytes(10);

        assert_eq!(config.log_path, PathBuf::from("/var/spool/app.log"));
        assert_eq!(config.tick_interval, Duration::from_millis(10));
        assert!(config.replay_immediately);
        assert_eq!(config.size_limit_bytes, 10);
    }

    #[test]
    fn test_from_lookup() {
        let config = BufferConfig::from_lookup(lookup_from(&[
            ("OFFGRID_LOG_PATH", "/tmp/offgrid/events.log"),
            ("OFFGRID_TICK_INTERVAL_MS", "250"),
            ("OFFGRID_SIZE_LIMIT_BYTES", "4096"),
            ("OFFGRID_REPLAY_IMMEDIATELY", "TRUE"),
        ]));

        assert_eq!(config.log_path, PathBuf::from("/tmp/offgrid/events.log"));
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.size_limit_bytes, 4096);
        assert!(config.replay_immediately);
    }

    #[test]
    fn test_from_lookup_falls_back_on_bad_values() {
        let config = BufferConfig::from_lookup(lookup_from(&[
            ("OFFGRID_TICK_INTERVAL_MS", "soon"),
            ("OFFGRID_SIZE_LIMIT_BYTES", "-1"),
            ("OFFGRID_REPLAY_IMMEDIATELY", "nope"),
        ]));

        assert_eq!(config, BufferConfig::default());
    }

    #[test]
    fn test_relative_path_resolved() {
        let config = BufferConfig::from_lookup(lookup_from(&[("OFFGRID_LOG_PATH", "spool/a.log")]));
        assert!(config.log_path.is_absolute());
        assert!(config.log_path.ends_with("spool/a.log"));
    }
}
