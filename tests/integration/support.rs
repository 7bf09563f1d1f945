//! In-process fakes for the service, fetcher and renderer seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atelier::asset::{encode_glb, AssetFetcher};
use atelier::error::ApiError;
use atelier::generation::{StatusReport, TaskKind};
use atelier::provider::{GenerationPayload, GenerationService, TaskTicket};
use atelier::retry::{RetryConfig, RetryPolicy};
use atelier::telemetry::{MemorySink, SharedSink, TelemetryEvent, TelemetrySink};

pub type StatusFallback = Box<dyn Fn() -> Result<StatusReport, ApiError> + Send + Sync>;

/// Generation service that replays scripted responses.
pub struct ScriptedService {
    submits: Mutex<VecDeque<Result<TaskTicket, ApiError>>>,
    statuses: Mutex<VecDeque<Result<StatusReport, ApiError>>>,
    when_exhausted: StatusFallback,
    next_id: AtomicU32,
    pub submit_calls: AtomicU32,
    pub status_calls: AtomicU32,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            submits: Mutex::new(VecDeque::new()),
            statuses: Mutex::new(VecDeque::new()),
            when_exhausted: Box::new(|| Ok(StatusReport::processing(0))),
            next_id: AtomicU32::new(1),
            submit_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
        }
    }

    pub fn with_statuses(statuses: Vec<Result<StatusReport, ApiError>>) -> Self {
        let service = Self::new();
        service.statuses.lock().extend(statuses);
        service
    }

    pub fn with_submits(self, submits: Vec<Result<TaskTicket, ApiError>>) -> Self {
        self.submits.lock().extend(submits);
        self
    }

    pub fn when_exhausted(
        mut self,
        fallback: impl Fn() -> Result<StatusReport, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.when_exhausted = Box::new(fallback);
        self
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn submit(
        &self,
        _kind: TaskKind,
        _payload: &GenerationPayload,
    ) -> Result<TaskTicket, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        match self.submits.lock().pop_front() {
            Some(result) => result,
            None => Ok(TaskTicket {
                task_id: format!("task-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            }),
        }
    }

    async fn status(&self, _task_id: &str) -> Result<StatusReport, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.statuses.lock().pop_front();
        match next {
            Some(result) => result,
            None => (self.when_exhausted)(),
        }
    }

    fn service_name(&self) -> &str {
        "scripted"
    }
}

/// How a fake fetch of one reference behaves.
#[derive(Clone)]
pub enum Fetch {
    Payload(Vec<u8>),
    /// Never answers; only a per-attempt timeout ends the attempt.
    Hang,
    Refused,
    NotFound,
}

/// Asset fetcher with a fixed behavior per reference.
#[derive(Default)]
pub struct FakeFetcher {
    behaviors: HashMap<String, Fetch>,
    calls: Mutex<HashMap<String, u32>>,
    order: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, reference: &str, behavior: Fetch) -> Self {
        self.behaviors.insert(reference.to_string(), behavior);
        self
    }

    pub fn calls(&self, reference: &str) -> u32 {
        self.calls.lock().get(reference).copied().unwrap_or(0)
    }

    /// References in the order they were first fetched.
    pub fn order(&self) -> Vec<String> {
        self.order.lock().clone()
    }
}

#[async_trait]
impl AssetFetcher for FakeFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ApiError> {
        {
            let mut calls = self.calls.lock();
            let count = calls.entry(reference.to_string()).or_insert(0);
            if *count == 0 {
                self.order.lock().push(reference.to_string());
            }
            *count += 1;
        }
        match self.behaviors.get(reference).cloned() {
            Some(Fetch::Payload(bytes)) => Ok(bytes),
            Some(Fetch::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ApiError::Transport("hung request finally gave up".to_string()))
            }
            Some(Fetch::Refused) => Err(ApiError::Transport("connection refused".to_string())),
            Some(Fetch::NotFound) | None => {
                Err(ApiError::AssetUnavailable(format!("404: {}", reference)))
            }
        }
    }
}

/// A small, valid GLB with one mesh.
pub fn valid_glb() -> Vec<u8> {
    encode_glb(
        &json!({
            "asset": {"version": "2.0", "generator": "fake-generator"},
            "meshes": [{"name": "avatar"}]
        }),
        &[0u8; 16],
    )
}

/// Sink that panics on every event.
pub struct ExplodingSink;

impl TelemetrySink for ExplodingSink {
    fn record(&self, _event: TelemetryEvent) {
        panic!("telemetry backend exploded");
    }
}

pub fn memory_sink() -> (Arc<MemorySink>, SharedSink) {
    let memory = Arc::new(MemorySink::new());
    let shared: SharedSink = memory.clone();
    (memory, shared)
}

pub fn fast_policy(label: &str, max_attempts: u32, sink: &SharedSink) -> RetryPolicy {
    RetryPolicy::new(
        label,
        RetryConfig::new(max_attempts, Duration::from_millis(10)),
        Arc::clone(sink),
    )
    .unwrap()
}
