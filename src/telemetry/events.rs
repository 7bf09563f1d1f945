//! Event schema for telemetry.

use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ErrorKind};

/// Component that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    RetryPolicy,
    Orchestrator,
    Loader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// An attempt succeeded.
    Success,
    /// An attempt failed and another one is scheduled.
    Retry,
    /// The last attempt failed; the error is surfaced.
    Failure,
    /// Task submitted and accepted by the service.
    Submitted,
    /// Non-terminal task status or progress changed.
    Progress,
    Completed,
    Failed,
    /// A status poll could not reach the service; the task keeps its status.
    PollDeferred,
    Abandoned,
    Superseded,
    CandidateFailed,
    CandidateSkipped,
    CandidateSelected,
    /// Resolution fell through to the procedural placeholder.
    Fallback,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Retry => "retry",
            Outcome::Failure => "failure",
            Outcome::Submitted => "submitted",
            Outcome::Progress => "progress",
            Outcome::Completed => "completed",
            Outcome::Failed => "failed",
            Outcome::PollDeferred => "poll_deferred",
            Outcome::Abandoned => "abandoned",
            Outcome::Superseded => "superseded",
            Outcome::CandidateFailed => "candidate_failed",
            Outcome::CandidateSkipped => "candidate_skipped",
            Outcome::CandidateSelected => "candidate_selected",
            Outcome::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub ts: String,
    pub component: Component,
    pub outcome: Outcome,
    pub attempt: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TelemetryEvent {
    pub fn new(component: Component, outcome: Outcome) -> Self {
        Self {
            ts: now_rfc3339(),
            component,
            outcome,
            attempt: 1,
            error_kind: None,
            duration_ms: 0,
            label: None,
            task_id: None,
            reference: None,
            delay_ms: None,
            message: None,
        }
    }

    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn error(mut self, err: &ApiError) -> Self {
        self.error_kind = Some(err.kind());
        self.message = Some(err.to_string());
        self
    }

    pub fn error_kind(mut self, kind: ErrorKind) -> Self {
        self.error_kind = Some(kind);
        self
    }

    pub fn elapsed(mut self, elapsed: Duration) -> Self {
        self.duration_ms = elapsed.as_millis() as u64;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(delay.as_millis() as u64);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Current UTC time as RFC 3339 with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
