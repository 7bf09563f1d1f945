//! Generation task model and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::asset::PlaceholderShape;
use crate::error::ErrorKind;

/// What the remote service is asked to produce, and from what.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    BodyFromImages,
    BodyFromVideo,
    ClothingFromImage,
    ClothingFromVideo,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::BodyFromImages,
        TaskKind::BodyFromVideo,
        TaskKind::ClothingFromImage,
        TaskKind::ClothingFromVideo,
    ];

    /// Path segment used by the generation service.
    pub fn slug(self) -> &'static str {
        match self {
            TaskKind::BodyFromImages => "body-from-images",
            TaskKind::BodyFromVideo => "body-from-video",
            TaskKind::ClothingFromImage => "clothing-from-image",
            TaskKind::ClothingFromVideo => "clothing-from-video",
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, TaskKind::BodyFromVideo | TaskKind::ClothingFromVideo)
    }

    pub fn placeholder_shape(self) -> PlaceholderShape {
        match self {
            TaskKind::BodyFromImages | TaskKind::BodyFromVideo => PlaceholderShape::Body,
            TaskKind::ClothingFromImage | TaskKind::ClothingFromVideo => PlaceholderShape::Garment,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        TaskKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown task kind '{}' (expected one of: {})",
                    s,
                    TaskKind::ALL.map(|k| k.slug()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locations and metadata of a generated asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBundle {
    pub primary_url: String,
    #[serde(default)]
    pub mirrors: Vec<String>,
    #[serde(default)]
    pub vertex_count: Option<u64>,
    #[serde(default)]
    pub face_count: Option<u64>,
    /// Body measurements in centimetres, keyed by name (chest, waist, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<BTreeMap<String, f64>>,
    /// Garment material description, as returned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<serde_json::Value>,
}

impl AssetBundle {
    pub fn new(primary_url: impl Into<String>) -> Self {
        Self {
            primary_url: primary_url.into(),
            mirrors: Vec::new(),
            vertex_count: None,
            face_count: None,
            measurements: None,
            material: None,
        }
    }

    pub fn with_mirror(mut self, mirror: impl Into<String>) -> Self {
        self.mirrors.push(mirror.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    pub kind: ErrorKind,
}

/// One status response from the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default)]
    pub result: Option<AssetBundle>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StatusReport {
    pub fn processing(progress: u8) -> Self {
        Self {
            status: TaskStatus::Processing,
            progress: Some(progress),
            result: None,
            error: None,
        }
    }

    pub fn completed(bundle: AssetBundle) -> Self {
        Self {
            status: TaskStatus::Completed,
            progress: Some(100),
            result: Some(bundle),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            progress: None,
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Effect of applying a status report to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Progressed,
    Terminal,
}

/// What a UI needs to tell apart.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskView<'a> {
    Working { status: TaskStatus, progress: u8 },
    Ready(&'a AssetBundle),
    GenerationFailed(&'a TaskError),
}

/// One outstanding or completed remote generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: String,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: u8,
    pub result: Option<AssetBundle>,
    pub error: Option<TaskError>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub poll_count: u32,
}

impl GenerationTask {
    pub fn queued(id: impl Into<String>, kind: TaskKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            status: TaskStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            submitted_at: now,
            updated_at: now,
            poll_count: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn view(&self) -> TaskView<'_> {
        match (&self.status, &self.result, &self.error) {
            (TaskStatus::Completed, Some(bundle), _) => TaskView::Ready(bundle),
            (TaskStatus::Failed, _, Some(error)) => TaskView::GenerationFailed(error),
            (status, _, _) => TaskView::Working {
                status: *status,
                progress: self.progress,
            },
        }
    }

    /// Apply one poll response.
    ///
    /// Terminal tasks never change again. Progress never decreases and is
    /// clamped to 100; a task that reached Processing does not go back to
    /// Queued. A Completed report without a result is treated as a failed job.
    pub fn apply_report(&mut self, report: StatusReport) -> Transition {
        if self.is_terminal() {
            return Transition::Unchanged;
        }
        self.poll_count += 1;

        match report.status {
            TaskStatus::Queued | TaskStatus::Processing => {
                let status = if self.status == TaskStatus::Processing {
                    TaskStatus::Processing
                } else {
                    report.status
                };
                let progress = if status == TaskStatus::Processing {
                    report
                        .progress
                        .unwrap_or(self.progress)
                        .min(100)
                        .max(self.progress)
                } else {
                    self.progress
                };
                if status == self.status && progress == self.progress {
                    return Transition::Unchanged;
                }
                self.status = status;
                self.progress = progress;
                self.touch();
                Transition::Progressed
            }
            TaskStatus::Completed => match report.result {
                Some(bundle) => {
                    self.status = TaskStatus::Completed;
                    self.progress = 100;
                    self.result = Some(bundle);
                    self.touch();
                    Transition::Terminal
                }
                None => {
                    self.fail(
                        ErrorKind::RemoteJob,
                        "generation service reported completion without a result",
                    );
                    Transition::Terminal
                }
            },
            TaskStatus::Failed => {
                let message = report
                    .error
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "generation failed".to_string());
                self.fail(ErrorKind::RemoteJob, message);
                Transition::Terminal
            }
        }
    }

    /// Move to Failed. No-op on a terminal task.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(TaskError {
            message: message.into(),
            kind,
        });
        self.touch();
        true
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
