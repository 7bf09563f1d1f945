//! CLI presentation: text and JSON renderings of tasks, resolutions and telemetry.

use comfy_table::{presets::UTF8_FULL, Table};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::asset::Resolution;
use crate::error::ApiError;
use crate::generation::{GenerationTask, StatusReport, TaskView};
use crate::telemetry::TelemetryEvent;

fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::ConfigError(format!("Failed to render JSON: {}", e)))
}

fn heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn format_task(task: &GenerationTask, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(task);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);
    table.add_row(vec!["Task".to_string(), task.id.clone()]);
    table.add_row(vec!["Kind".to_string(), task.kind.to_string()]);
    table.add_row(vec!["Submitted".to_string(), task.submitted_at.to_rfc3339()]);
    table.add_row(vec!["Polls".to_string(), task.poll_count.to_string()]);

    let state = match task.view() {
        TaskView::Working { status, progress } => {
            table.add_row(vec!["Status".to_string(), format!("{} ({}%)", status, progress)]);
            format!("{}", "still working".yellow())
        }
        TaskView::Ready(bundle) => {
            table.add_row(vec!["Asset".to_string(), bundle.primary_url.clone()]);
            if !bundle.mirrors.is_empty() {
                table.add_row(vec!["Mirrors".to_string(), bundle.mirrors.join("\n")]);
            }
            if let (Some(v), Some(f)) = (bundle.vertex_count, bundle.face_count) {
                table.add_row(vec!["Mesh".to_string(), format!("{} vertices, {} faces", v, f)]);
            }
            if let Some(measurements) = &bundle.measurements {
                let lines: Vec<String> = measurements
                    .iter()
                    .map(|(name, cm)| format!("{}: {:.1} cm", name, cm))
                    .collect();
                table.add_row(vec!["Measurements".to_string(), lines.join("\n")]);
            }
            format!("{}", "ready".green())
        }
        TaskView::GenerationFailed(error) => {
            table.add_row(vec!["Error".to_string(), format!("[{}] {}", error.kind, error.message)]);
            format!("{}", "generation failed".red())
        }
    };

    Ok(format!("{} {}\n{}", heading("Generation task"), state, table))
}

pub fn format_status_report(
    task_id: &str,
    report: &StatusReport,
    format: &str,
) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&serde_json::json!({ "task_id": task_id, "report": report }));
    }
    let mut lines = vec![
        heading("Task status"),
        format!("  Task:     {}", task_id),
        format!("  Status:   {}", report.status),
    ];
    if let Some(progress) = report.progress {
        lines.push(format!("  Progress: {}%", progress));
    }
    if let Some(result) = &report.result {
        lines.push(format!("  Asset:    {}", result.primary_url));
    }
    if let Some(error) = &report.error {
        lines.push(format!("  Error:    {}", error));
    }
    Ok(lines.join("\n"))
}

pub fn format_resolution(resolution: &Resolution, format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(resolution);
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Candidate", "Format", "Result"]);
    for (index, candidate) in resolution.candidates.iter().enumerate() {
        let result = if index == resolution.selected {
            "selected".to_string()
        } else if let Some(failure) = resolution
            .failures
            .iter()
            .find(|f| f.reference == candidate.reference)
        {
            format!("failed [{}]: {}", failure.kind, failure.message)
        } else if candidate.attempted {
            "tried".to_string()
        } else {
            "not tried".to_string()
        };
        table.add_row(vec![
            (index + 1).to_string(),
            candidate.reference.clone(),
            candidate.format.to_string(),
            result,
        ]);
    }

    let asset = &resolution.asset;
    let summary = if resolution.is_placeholder() {
        format!(
            "{} showing a {} placeholder ({} vertices)",
            "degraded:".yellow(),
            asset
                .model
                .placeholder
                .map(|s| s.to_string())
                .unwrap_or_else(|| "generic".to_string()),
            asset.model.vertex_count.unwrap_or(0)
        )
    } else {
        format!(
            "{} {} ({} bytes, {} meshes, blake3 {})",
            "loaded".green(),
            asset.reference,
            asset.byte_len,
            asset.model.mesh_count,
            asset.digest.as_deref().unwrap_or("-")
        )
    };

    Ok(format!("{}\n{}\n{}", heading("Asset resolution"), table, summary))
}

pub fn format_events(events: &[TelemetryEvent], format: &str) -> Result<String, ApiError> {
    if format == "json" {
        return to_json(&events);
    }
    if events.is_empty() {
        return Ok("Telemetry journal is empty.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Time", "Component", "Outcome", "Attempt", "Error", "ms", "Subject"]);
    for event in events {
        let subject = event
            .task_id
            .as_deref()
            .or(event.reference.as_deref())
            .or(event.label.as_deref())
            .unwrap_or("-");
        table.add_row(vec![
            event.ts.clone(),
            format!("{:?}", event.component),
            event.outcome.as_str().to_string(),
            event.attempt.to_string(),
            event
                .error_kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "-".to_string()),
            event.duration_ms.to_string(),
            subject.to_string(),
        ]);
    }
    Ok(table.to_string())
}
