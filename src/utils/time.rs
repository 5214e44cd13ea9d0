//! Time and timestamp utilities

/// Get the current Unix timestamp in milliseconds, from the wall clock.
///
/// Successive calls are not guaranteed to be monotonic.
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
