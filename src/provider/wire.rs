//! JSON shapes exchanged with the generation service.
//!
//! Field aliases absorb the naming drift between service versions; everything
//! is converted into the crate's own types before leaving this module.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::ApiError;
use crate::generation::task::{AssetBundle, StatusReport, TaskStatus};
use crate::provider::TaskTicket;

#[derive(Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub media: &'a [String],
    #[serde(skip_serializing_if = "no_options")]
    pub options: &'a Map<String, Value>,
}

fn no_options(options: &&Map<String, Value>) -> bool {
    options.is_empty()
}

#[derive(Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(alias = "id", alias = "taskId", alias = "job_id")]
    task_id: String,
}

impl SubmitResponse {
    pub fn into_ticket(self) -> Result<TaskTicket, ApiError> {
        let task_id = self.task_id.trim().to_string();
        if task_id.is_empty() {
            return Err(ApiError::Rejected(
                "service accepted the request but returned an empty task id".to_string(),
            ));
        }
        Ok(TaskTicket { task_id })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireError {
    Message(String),
    Detail { message: String },
}

#[derive(Deserialize)]
struct WireResult {
    #[serde(alias = "url", alias = "model_url", alias = "glb_url")]
    primary_url: String,
    #[serde(default, alias = "mirror_urls", alias = "fallback_urls")]
    mirrors: Vec<String>,
    #[serde(default, alias = "vertices")]
    vertex_count: Option<u64>,
    #[serde(default, alias = "faces")]
    face_count: Option<u64>,
    #[serde(default)]
    measurements: Option<BTreeMap<String, f64>>,
    #[serde(default)]
    material: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct StatusResponse {
    status: String,
    /// Percentage, 0-100.
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    result: Option<WireResult>,
    #[serde(default)]
    error: Option<WireError>,
}

impl StatusResponse {
    pub fn into_report(self) -> Result<StatusReport, ApiError> {
        let status = parse_status(&self.status).ok_or_else(|| {
            ApiError::Transport(format!("unrecognized task status '{}'", self.status))
        })?;
        let progress = self
            .progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0).round() as u8);
        let result = self.result.map(|r| AssetBundle {
            primary_url: r.primary_url,
            mirrors: r.mirrors,
            vertex_count: r.vertex_count,
            face_count: r.face_count,
            measurements: r.measurements,
            material: r.material,
        });
        let error = self.error.map(|e| match e {
            WireError::Message(message) | WireError::Detail { message } => message,
        });
        Ok(StatusReport {
            status,
            progress,
            result,
            error,
        })
    }
}

pub(crate) fn parse_status(raw: &str) -> Option<TaskStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "queued" | "pending" | "waiting" => Some(TaskStatus::Queued),
        "processing" | "running" | "in_progress" => Some(TaskStatus::Processing),
        "completed" | "complete" | "succeeded" | "success" => Some(TaskStatus::Completed),
        "failed" | "error" | "cancelled" => Some(TaskStatus::Failed),
        _ => None,
    }
}
