//! Telemetry primitives for attempt-level observability.
//! By default, no telemetry is emitted unless a sink is installed via `set_telemetry_sink`.

pub mod types;

pub use types::*;

use std::sync::Arc;

use once_cell::sync::OnceCell;

/// Implement this to receive one record per analysis attempt.
///
/// Requirements:
/// - Implementations must be thread-safe (`Send + Sync`) and `'static`.
/// - `record_attempt` may be called from any thread; avoid panicking.
/// - Keep overhead minimal; this runs at the end of every attempt.
pub trait TelemetrySink: Send + Sync + 'static {
    fn record_attempt(&self, log: AttemptLog);
}

static TELEMETRY_SINK: OnceCell<Arc<dyn TelemetrySink>> = OnceCell::new();

// In tests, gate emission to only the calling test thread to avoid cross-test interference.
#[cfg(test)]
thread_local! {
    static TEST_CAPTURE: std::cell::Cell<bool> = const { std::cell::Cell::new(false) };
}

/// Install a global telemetry sink. Returns `false` if a sink is already installed.
///
/// This is a write-once global for the process lifetime (backed by `OnceCell`).
pub fn set_telemetry_sink(sink: Arc<dyn TelemetrySink>) -> bool {
    TELEMETRY_SINK.set(sink).is_ok()
}

/// Emit an attempt record if a sink is installed. Crate-visible by design.
///
/// In tests, emission is suppressed unless enabled via `test_set_capture_enabled`.
#[inline]
pub(crate) fn emit_attempt(log: AttemptLog) {
    #[cfg(test)]
    {
        if !TEST_CAPTURE.with(|c| c.get()) {
            return;
        }
    }
    if let Some(sink) = TELEMETRY_SINK.get() {
        sink.record_attempt(log);
    }
}

#[cfg(test)]
/// Test-only helper: enable or disable capture for the current test thread.
pub fn test_set_capture_enabled(enabled: bool) {
    TEST_CAPTURE.with(|c| c.set(enabled));
}
