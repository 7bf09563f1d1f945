//! Application-facing API
//!
//! [`Atelier`] wires the generation service, the orchestrator, the asset
//! loader and telemetry together from one [`AtelierConfig`]. It is the
//! surface the surrounding application calls into.

use std::sync::Arc;
use tracing::{debug, info};

use crate::asset::{
    AssetCandidate, AssetChain, AssetFetcher, HttpAssetFetcher, HeadlessRenderer, Renderer,
    Resolution, ResilientAssetLoader,
};
use crate::config::AtelierConfig;
use crate::error::ApiError;
use crate::generation::{
    GenerationOrchestrator, GenerationTask, StatusReport, TaskHandle, TaskKind, TaskStatus,
};
use crate::provider::{GenerationPayload, GenerationService, HttpGenerationService};
use crate::retry::RetryPolicy;
use crate::telemetry::{FanoutSink, SharedSink, TelemetryJournal, TracingSink};

/// Generation orchestration and asset resolution behind one handle.
#[derive(Clone)]
pub struct Atelier {
    orchestrator: GenerationOrchestrator,
    loader: ResilientAssetLoader,
    sink: SharedSink,
    journal: Option<TelemetryJournal>,
}

impl Atelier {
    /// Production wiring: HTTP service, HTTP/file fetcher, headless renderer,
    /// tracing telemetry and the journal when enabled.
    pub fn from_config(config: &AtelierConfig) -> Result<Self, ApiError> {
        let mut fanout = FanoutSink::new(vec![Arc::new(TracingSink)]);
        let journal = if config.telemetry.journal {
            let path = config.telemetry.resolved_journal_path()?;
            let journal = TelemetryJournal::open(&path)?;
            let pruned = journal.prune(config.telemetry.max_events)?;
            debug!(path = %path.display(), pruned, "telemetry journal opened");
            fanout.push(Arc::new(journal.clone()));
            Some(journal)
        } else {
            None
        };
        let sink: SharedSink = Arc::new(fanout);

        let service = Arc::new(HttpGenerationService::new(&config.service)?);
        let fetcher = Arc::new(HttpAssetFetcher::new(
            std::time::Duration::from_millis(config.loader.fetch_timeout_ms),
            config.loader.max_payload_bytes,
        )?);
        let renderer = Arc::new(HeadlessRenderer {
            supports_glb: config.loader.glb_supported,
            max_payload_bytes: config.loader.max_payload_bytes,
        });

        let mut atelier = Self::with_parts(service, fetcher, renderer, config, sink)?;
        atelier.journal = journal;
        Ok(atelier)
    }

    /// Wire caller-supplied collaborators with the policies from `config`.
    pub fn with_parts(
        service: Arc<dyn GenerationService>,
        fetcher: Arc<dyn AssetFetcher>,
        renderer: Arc<dyn Renderer>,
        config: &AtelierConfig,
        sink: SharedSink,
    ) -> Result<Self, ApiError> {
        config.loader.validate()?;
        let submit = RetryPolicy::new("submit", config.retry.submit.clone(), Arc::clone(&sink))?;
        let poll = RetryPolicy::new("poll", config.retry.poll.clone(), Arc::clone(&sink))?;
        let fetch = RetryPolicy::new("fetch", config.retry.fetch.clone(), Arc::clone(&sink))?;

        let orchestrator = GenerationOrchestrator::new(
            service,
            submit,
            poll,
            config.orchestrator.clone(),
            Arc::clone(&sink),
        )?;
        let loader = ResilientAssetLoader::new(fetcher, renderer, fetch, Arc::clone(&sink));

        Ok(Self {
            orchestrator,
            loader,
            sink,
            journal: None,
        })
    }

    /// Submit a generation request. Resolves once with a handle, or fails once
    /// with the submission error.
    pub async fn submit_generation(
        &self,
        kind: TaskKind,
        payload: &GenerationPayload,
    ) -> Result<TaskHandle, ApiError> {
        self.orchestrator.submit(kind, payload).await
    }

    /// One status request for a task this process is not polling.
    pub async fn task_status(&self, task_id: &str) -> Result<StatusReport, ApiError> {
        self.orchestrator.fetch_status(task_id).await
    }

    /// Resolve candidates to a displayable asset. Never fails; a procedural
    /// placeholder is appended when the list does not end in one.
    pub async fn resolve_asset(&self, candidates: Vec<AssetCandidate>) -> Resolution {
        self.loader.resolve(&AssetChain::new(candidates)).await
    }

    /// Resolve the result of a completed task. `None` unless the task completed.
    pub async fn resolve_task_result(&self, task: &GenerationTask) -> Option<Resolution> {
        if task.status != TaskStatus::Completed {
            return None;
        }
        let bundle = task.result.as_ref()?;
        info!(task_id = %task.id, mirrors = bundle.mirrors.len(), "resolving generated asset");
        Some(
            self.loader
                .resolve(&AssetChain::from_bundle(bundle, task.kind))
                .await,
        )
    }

    pub fn orchestrator(&self) -> &GenerationOrchestrator {
        &self.orchestrator
    }

    pub fn loader(&self) -> &ResilientAssetLoader {
        &self.loader
    }

    pub fn sink(&self) -> &SharedSink {
        &self.sink
    }

    pub fn journal(&self) -> Option<&TelemetryJournal> {
        self.journal.as_ref()
    }
}
