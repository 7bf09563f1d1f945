//! Telemetry domain: event schema, the sink seam, and concrete sinks.

pub mod events;
pub mod sink;
pub mod sinks;

pub use events::{now_rfc3339, Component, Outcome, TelemetryEvent};
pub use sink::{guarded, null_sink, record_guarded, GuardedSink, NullSink, SharedSink, TelemetrySink};
pub use sinks::{FanoutSink, MemorySink, TelemetryJournal, TracingSink};
