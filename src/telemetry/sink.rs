//! The telemetry sink seam shared by every component.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::telemetry::events::TelemetryEvent;

/// Append-only receiver of telemetry events.
///
/// `record` has no return value: a sink that cannot store an event must log
/// and swallow the failure. Implementations are called concurrently from
/// independent poll loops and resolutions.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

pub type SharedSink = Arc<dyn TelemetrySink>;

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TelemetrySink for NullSink {
    fn record(&self, _event: TelemetryEvent) {}
}

pub fn null_sink() -> SharedSink {
    Arc::new(NullSink)
}

/// Record `event` on `sink`, logging and swallowing a panic raised by the sink.
pub fn record_guarded(sink: &dyn TelemetrySink, event: TelemetryEvent) {
    if catch_unwind(AssertUnwindSafe(|| sink.record(event))).is_err() {
        warn!("telemetry sink panicked while recording an event");
    }
}

/// Sink wrapper that contains panics from the wrapped sink.
#[derive(Clone)]
pub struct GuardedSink {
    inner: SharedSink,
}

impl TelemetrySink for GuardedSink {
    fn record(&self, event: TelemetryEvent) {
        record_guarded(self.inner.as_ref(), event);
    }
}

/// Wrap `sink` so telemetry failures never unwind into the caller.
pub fn guarded(sink: SharedSink) -> SharedSink {
    Arc::new(GuardedSink { inner: sink })
}
