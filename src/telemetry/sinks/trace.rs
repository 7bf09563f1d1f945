//! Sink that forwards events to the `tracing` subscriber.

use tracing::{debug, info, warn};

use crate::telemetry::events::{Outcome, TelemetryEvent};
use crate::telemetry::sink::TelemetrySink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: TelemetryEvent) {
        let component = format!("{:?}", event.component);
        let error_kind = event.error_kind.map(|k| k.as_str()).unwrap_or("-");
        match event.outcome {
            Outcome::Failure
            | Outcome::Failed
            | Outcome::CandidateFailed
            | Outcome::PollDeferred
            | Outcome::Fallback => warn!(
                component = %component,
                outcome = event.outcome.as_str(),
                attempt = event.attempt,
                error_kind,
                duration_ms = event.duration_ms,
                label = event.label.as_deref().unwrap_or("-"),
                task_id = event.task_id.as_deref().unwrap_or("-"),
                reference = event.reference.as_deref().unwrap_or("-"),
                "telemetry"
            ),
            Outcome::Completed | Outcome::Submitted | Outcome::CandidateSelected => info!(
                component = %component,
                outcome = event.outcome.as_str(),
                attempt = event.attempt,
                duration_ms = event.duration_ms,
                task_id = event.task_id.as_deref().unwrap_or("-"),
                reference = event.reference.as_deref().unwrap_or("-"),
                "telemetry"
            ),
            _ => debug!(
                component = %component,
                outcome = event.outcome.as_str(),
                attempt = event.attempt,
                error_kind,
                duration_ms = event.duration_ms,
                delay_ms = event.delay_ms.unwrap_or(0),
                label = event.label.as_deref().unwrap_or("-"),
                task_id = event.task_id.as_deref().unwrap_or("-"),
                "telemetry"
            ),
        }
    }
}
