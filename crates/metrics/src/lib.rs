//! Metrics facade for the block lock subsystem.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and
//! default no-op implementations. A global singleton recorder is accessed via
//! [`recorder()`], and convenience free functions delegate to it.
//!
//! Callers record metrics via the free functions:
//! ```ignore
//! blocklocks_metrics::record_lock_processed();
//! blocklocks_metrics::set_best_lock_height(height);
//! ```
//!
//! At startup the host installs a backend with [`install()`]; without one,
//! every call is a no-op.

use std::sync::OnceLock;

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    /// A lock passed verification and was adopted as best.
    fn record_lock_processed(&self) {}

    /// A lock was dropped; `reason` is a static label
    /// (`"duplicate"`, `"stale"`, `"invalid_signature"`, `"height_mismatch"`).
    fn record_lock_rejected(&self, reason: &'static str) {}

    /// A signing attempt was handed to the signing service.
    fn record_sign_attempt(&self) {}

    /// A signing attempt was abandoned because a transaction in the safety
    /// walk was neither instant-locked nor old enough.
    fn record_sign_deferred(&self) {}

    /// A lock was enforced and notified for the first time.
    fn record_lock_enforced(&self, height: i32) {}

    /// Set the height of the current best lock gauge.
    fn set_best_lock_height(&self, height: i32) {}

    /// Seen-cache entries expired during cleanup.
    fn record_seen_expired(&self, count: usize) {}
}

/// No-op recorder used until a backend is installed.
struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}

static RECORDER: OnceLock<Box<dyn MetricsRecorder>> = OnceLock::new();

/// Install a metrics backend. Only the first call wins.
pub fn install(recorder: Box<dyn MetricsRecorder>) {
    let _ = RECORDER.set(recorder);
}

/// The currently installed recorder (no-op by default).
pub fn recorder() -> &'static dyn MetricsRecorder {
    static NOOP: NoopRecorder = NoopRecorder;
    match RECORDER.get() {
        Some(r) => r.as_ref(),
        None => &NOOP,
    }
}

/// See [`MetricsRecorder::record_lock_processed`].
pub fn record_lock_processed() {
    recorder().record_lock_processed();
}

/// See [`MetricsRecorder::record_lock_rejected`].
pub fn record_lock_rejected(reason: &'static str) {
    recorder().record_lock_rejected(reason);
}

/// See [`MetricsRecorder::record_sign_attempt`].
pub fn record_sign_attempt() {
    recorder().record_sign_attempt();
}

/// See [`MetricsRecorder::record_sign_deferred`].
pub fn record_sign_deferred() {
    recorder().record_sign_deferred();
}

/// See [`MetricsRecorder::record_lock_enforced`].
pub fn record_lock_enforced(height: i32) {
    recorder().record_lock_enforced(height);
}

/// See [`MetricsRecorder::set_best_lock_height`].
pub fn set_best_lock_height(height: i32) {
    recorder().set_best_lock_height(height);
}

/// See [`MetricsRecorder::record_seen_expired`].
pub fn record_seen_expired(count: usize) {
    recorder().record_seen_expired(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_recorder_by_default() {
        // Free functions must be callable with no backend installed.
        record_lock_processed();
        record_lock_rejected("duplicate");
        record_sign_attempt();
        record_sign_deferred();
        record_lock_enforced(100);
        set_best_lock_height(100);
        record_seen_expired(3);
    }
}
