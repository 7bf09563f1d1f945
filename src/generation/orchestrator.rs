//! Submission and the per-task poll loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ErrorKind};
use crate::generation::handle::TaskHandle;
use crate::generation::task::{GenerationTask, StatusReport, TaskKind, TaskStatus, Transition};
use crate::provider::{GenerationPayload, GenerationService};
use crate::retry::RetryPolicy;
use crate::telemetry::{guarded, Component, Outcome, SharedSink, TelemetryEvent};

/// Poll loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Time between one poll settling and the next one starting (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Fail a task once the service has been unreachable for this long
    /// (milliseconds since the last successful status response). Unset means
    /// keep waiting indefinitely.
    #[serde(default)]
    pub max_unreachable_ms: Option<u64>,

    /// Submitting a task discards the previous task of the same kind.
    #[serde(default = "default_supersede_same_kind")]
    pub supersede_same_kind: bool,
}

fn default_poll_interval_ms() -> u64 {
    3_000
}

fn default_supersede_same_kind() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_unreachable_ms: None,
            supersede_same_kind: default_supersede_same_kind(),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.poll_interval_ms == 0 {
            return Err(ApiError::ConfigError(
                "orchestrator.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_unreachable_ms == Some(0) {
            return Err(ApiError::ConfigError(
                "orchestrator.max_unreachable_ms must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_unreachable(&self) -> Option<Duration> {
        self.max_unreachable_ms.map(Duration::from_millis)
    }
}

/// Tasks still being polled, oldest first within each kind.
type ActiveTasks = Arc<Mutex<HashMap<TaskKind, Vec<TaskHandle>>>>;

/// Drives generation tasks from submission to a terminal state.
///
/// Every submitted task gets its own poll loop on the tokio runtime. The loop
/// issues one retry-wrapped status request at a time, waits the configured
/// interval after it settles, and stops at the terminal transition or when the
/// handle is discarded.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    service: Arc<dyn GenerationService>,
    submit_policy: RetryPolicy,
    poll_policy: RetryPolicy,
    config: OrchestratorConfig,
    sink: SharedSink,
    active: ActiveTasks,
}

impl GenerationOrchestrator {
    pub fn new(
        service: Arc<dyn GenerationService>,
        submit_policy: RetryPolicy,
        poll_policy: RetryPolicy,
        config: OrchestratorConfig,
        sink: SharedSink,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            service,
            submit_policy,
            poll_policy,
            config,
            sink: guarded(sink),
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Submit a generation request and start polling it.
    ///
    /// Returns once the service has assigned a task id. A submission that
    /// still fails after retries is returned as the error and no task exists.
    /// Must be called from within a tokio runtime.
    pub async fn submit(
        &self,
        kind: TaskKind,
        payload: &GenerationPayload,
    ) -> Result<TaskHandle, ApiError> {
        payload.validate_for(kind)?;

        let started = Instant::now();
        let service = &self.service;
        let ticket = self
            .submit_policy
            .execute(move || service.submit(kind, payload))
            .await?;

        let handle = TaskHandle::new(GenerationTask::queued(ticket.task_id.clone(), kind));
        info!(
            task_id = %ticket.task_id,
            kind = %kind,
            service = self.service.service_name(),
            "generation task submitted"
        );
        self.sink.record(
            TelemetryEvent::new(Component::Orchestrator, Outcome::Submitted)
                .elapsed(started.elapsed())
                .task(&ticket.task_id)
                .label(kind.slug()),
        );

        self.track(&handle);

        let poller = Poller {
            service: Arc::clone(&self.service),
            policy: self.poll_policy.clone(),
            config: self.config.clone(),
            sink: Arc::clone(&self.sink),
            active: Arc::clone(&self.active),
        };
        tokio::spawn(poller.run(handle.clone()));

        Ok(handle)
    }

    /// One retry-wrapped status request, outside of any poll loop.
    pub async fn fetch_status(&self, task_id: &str) -> Result<StatusReport, ApiError> {
        let service = &self.service;
        self.poll_policy
            .execute(move || service.status(task_id))
            .await
    }

    /// The most recently submitted task of `kind` that is still being polled.
    pub fn active(&self, kind: TaskKind) -> Option<TaskHandle> {
        self.active
            .lock()
            .get(&kind)
            .and_then(|tasks| tasks.last().cloned())
    }

    /// Every task of `kind` that is still being polled, oldest first.
    pub fn active_all(&self, kind: TaskKind) -> Vec<TaskHandle> {
        self.active.lock().get(&kind).cloned().unwrap_or_default()
    }

    /// Discard every task that is still being polled.
    pub fn discard_all(&self) {
        let handles: Vec<TaskHandle> = self
            .active
            .lock()
            .drain()
            .flat_map(|(_, tasks)| tasks)
            .collect();
        for handle in handles {
            handle.discard();
        }
    }

    fn track(&self, handle: &TaskHandle) {
        let superseded = {
            let mut active = self.active.lock();
            let tasks = active.entry(handle.kind()).or_default();
            let superseded = if self.config.supersede_same_kind {
                std::mem::take(tasks)
            } else {
                Vec::new()
            };
            tasks.push(handle.clone());
            superseded
        };
        for previous in superseded
            .into_iter()
            .filter(|p| !p.same_task(handle) && !p.is_terminal())
        {
            debug!(
                task_id = %previous.id(),
                replaced_by = %handle.id(),
                "superseding generation task"
            );
            previous.discard();
            self.sink.record(
                TelemetryEvent::new(Component::Orchestrator, Outcome::Superseded)
                    .task(previous.id())
                    .label(previous.kind().slug()),
            );
        }
    }
}

/// Owned state of one poll loop.
struct Poller {
    service: Arc<dyn GenerationService>,
    policy: RetryPolicy,
    config: OrchestratorConfig,
    sink: SharedSink,
    active: ActiveTasks,
}

impl Poller {
    async fn run(self, handle: TaskHandle) {
        let task_id = handle.id();
        let interval = self.config.poll_interval();
        let mut last_contact = Instant::now();

        debug!(task_id = %task_id, interval_ms = self.config.poll_interval_ms, "poll loop started");

        loop {
            if handle.is_discarded() {
                self.abandoned(&handle);
                break;
            }

            let started = Instant::now();
            let service = &self.service;
            let id = task_id.as_str();
            let result = self.policy.execute(move || service.status(id)).await;

            // A poll that was in flight when the caller discarded the task is dropped.
            if handle.is_discarded() {
                self.abandoned(&handle);
                break;
            }

            match result {
                Ok(report) => {
                    last_contact = Instant::now();
                    match handle.apply(report) {
                        Transition::Terminal => {
                            self.terminal(&handle, started.elapsed());
                            break;
                        }
                        Transition::Progressed => {
                            let task = handle.snapshot();
                            debug!(
                                task_id = %task_id,
                                status = %task.status,
                                progress = task.progress,
                                "generation progress"
                            );
                            self.sink.record(
                                TelemetryEvent::new(Component::Orchestrator, Outcome::Progress)
                                    .elapsed(started.elapsed())
                                    .task(&task_id)
                                    .message(format!("{} {}%", task.status, task.progress)),
                            );
                        }
                        Transition::Unchanged => {}
                    }
                }
                Err(err) if err.kind().is_retryable() => {
                    let unreachable_for = last_contact.elapsed();
                    warn!(
                        task_id = %task_id,
                        unreachable_ms = unreachable_for.as_millis() as u64,
                        error = %err,
                        "status poll failed, keeping task status"
                    );
                    self.sink.record(
                        TelemetryEvent::new(Component::Orchestrator, Outcome::PollDeferred)
                            .error(&err)
                            .elapsed(started.elapsed())
                            .task(&task_id),
                    );
                    if let Some(limit) = self.config.max_unreachable() {
                        if unreachable_for >= limit {
                            let message = format!(
                                "service unreachable for {}ms: {}",
                                unreachable_for.as_millis(),
                                err
                            );
                            if handle.fail(ErrorKind::Transport, message) {
                                self.terminal(&handle, started.elapsed());
                            }
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(task_id = %task_id, error = %err, "status poll failed terminally");
                    if handle.fail(err.kind(), err.to_string()) {
                        self.terminal(&handle, started.elapsed());
                    }
                    break;
                }
            }

            handle.pause(interval).await;
        }

        let mut active = self.active.lock();
        if let Some(tasks) = active.get_mut(&handle.kind()) {
            tasks.retain(|current| !current.same_task(&handle));
            if tasks.is_empty() {
                active.remove(&handle.kind());
            }
        }
    }

    fn terminal(&self, handle: &TaskHandle, elapsed: Duration) {
        let task = handle.snapshot();
        let mut event = TelemetryEvent::new(
            Component::Orchestrator,
            if task.status == TaskStatus::Completed {
                Outcome::Completed
            } else {
                Outcome::Failed
            },
        )
        .attempt(task.poll_count.max(1))
        .elapsed(elapsed)
        .task(&task.id)
        .label(task.kind.slug());

        match &task.error {
            Some(error) => {
                info!(
                    task_id = %task.id,
                    kind = %error.kind,
                    error = %error.message,
                    "generation task failed"
                );
                event = event.error_kind(error.kind).message(&error.message);
            }
            None => info!(task_id = %task.id, polls = task.poll_count, "generation task completed"),
        }
        self.sink.record(event);
    }

    fn abandoned(&self, handle: &TaskHandle) {
        debug!(task_id = %handle.id(), "poll loop stopped for discarded task");
        self.sink.record(
            TelemetryEvent::new(Component::Orchestrator, Outcome::Abandoned).task(handle.id()),
        );
    }
}
