//! Sink that forwards each event to several sinks.

use crate::telemetry::events::TelemetryEvent;
use crate::telemetry::sink::{record_guarded, SharedSink, TelemetrySink};

#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<SharedSink>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<SharedSink>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: SharedSink) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&self, event: TelemetryEvent) {
        for sink in &self.sinks {
            // A panicking sink must not take the others down with it.
            record_guarded(sink.as_ref(), event.clone());
        }
    }
}
