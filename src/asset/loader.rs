//! Ordered-fallback asset resolution.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::abandon::AbandonToken;
use crate::asset::candidate::{AssetCandidate, AssetChain, AssetFormat};
use crate::asset::fetch::AssetFetcher;
use crate::asset::glb::inspect_glb;
use crate::asset::renderer::{RenderedModel, Renderer};
use crate::error::{ApiError, ErrorKind};
use crate::retry::RetryPolicy;
use crate::telemetry::{guarded, Component, Outcome, SharedSink, TelemetryEvent};

/// Loader and default collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Whole-request timeout for one asset download (milliseconds)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Largest payload accepted from any candidate (bytes)
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,

    /// Whether the default renderer can display GLB assets
    #[serde(default = "default_glb_supported")]
    pub glb_supported: bool,
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

fn default_max_payload_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_glb_supported() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_payload_bytes: default_max_payload_bytes(),
            glb_supported: default_glb_supported(),
        }
    }
}

impl LoaderConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.fetch_timeout_ms == 0 {
            return Err(ApiError::ConfigError(
                "loader.fetch_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(ApiError::ConfigError(
                "loader.max_payload_bytes must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// The generated asset itself.
    Full,
    /// A locally generated stand-in.
    Placeholder,
}

/// A displayable asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadedAsset {
    pub reference: String,
    pub format: AssetFormat,
    pub fidelity: Fidelity,
    pub model: RenderedModel,
    /// blake3 of the payload, hex encoded. Absent for placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub byte_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFailure {
    pub reference: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub asset: LoadedAsset,
    /// Index of the selected candidate in `candidates`.
    pub selected: usize,
    /// The chain as seen by this pass, with `attempted` flags set.
    pub candidates: Vec<AssetCandidate>,
    /// Failed candidates, in the order they were tried.
    pub failures: Vec<CandidateFailure>,
}

impl Resolution {
    pub fn is_placeholder(&self) -> bool {
        self.asset.fidelity == Fidelity::Placeholder
    }

    pub fn selected_candidate(&self) -> &AssetCandidate {
        &self.candidates[self.selected]
    }
}

/// Turns a candidate chain into something displayable, one candidate at a time.
///
/// Each non-procedural candidate is fetched through the retry policy, checked
/// as a GLB container, and offered to the renderer. The first candidate that
/// passes all three wins. Candidates are never fetched in parallel and a
/// candidate is tried at most once per pass. Resolution cannot fail: the chain
/// always ends in a procedural placeholder.
#[derive(Clone)]
pub struct ResilientAssetLoader {
    fetcher: Arc<dyn AssetFetcher>,
    renderer: Arc<dyn Renderer>,
    policy: RetryPolicy,
    sink: SharedSink,
}

impl ResilientAssetLoader {
    /// A panic inside `sink` is contained and never interrupts resolution.
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        renderer: Arc<dyn Renderer>,
        policy: RetryPolicy,
        sink: SharedSink,
    ) -> Self {
        Self {
            fetcher,
            renderer,
            policy,
            sink: guarded(sink),
        }
    }

    pub async fn resolve(&self, chain: &AssetChain) -> Resolution {
        match self.resolve_until(chain, &AbandonToken::new()).await {
            Some(resolution) => resolution,
            // A fresh token is never abandoned.
            None => self.placeholder(chain, chain.len() - 1, Vec::new(), Vec::new()),
        }
    }

    /// Like [`resolve`](Self::resolve), but gives up between candidates once
    /// `abandon` is set. A fetch in flight at that moment finishes and its
    /// result is discarded.
    pub async fn resolve_until(
        &self,
        chain: &AssetChain,
        abandon: &AbandonToken,
    ) -> Option<Resolution> {
        let mut candidates = chain.candidates().to_vec();
        let mut failures = Vec::new();
        let mut tried: HashSet<String> = HashSet::new();
        let mut unsupported: HashSet<AssetFormat> = HashSet::new();
        let mut placeholder_at = candidates.len() - 1;

        for index in 0..candidates.len() {
            if abandon.is_abandoned() {
                self.abandoned(index);
                return None;
            }
            let candidate = candidates[index].clone();
            if candidate.is_procedural() {
                placeholder_at = index;
                break;
            }
            if unsupported.contains(&candidate.format) {
                self.skipped(index, &candidate, "format not supported by renderer");
                continue;
            }
            if !tried.insert(candidate.reference.clone()) {
                self.skipped(index, &candidate, "already tried in this pass");
                continue;
            }

            candidates[index].attempted = true;
            let started = Instant::now();
            let loaded = self.load(&candidate).await;
            if abandon.is_abandoned() {
                self.abandoned(index);
                return None;
            }

            match loaded {
                Ok(asset) => {
                    info!(
                        reference = %candidate.reference,
                        position = index,
                        failed_before = failures.len(),
                        "asset candidate selected"
                    );
                    self.sink.record(
                        TelemetryEvent::new(Component::Loader, Outcome::CandidateSelected)
                            .attempt(index as u32 + 1)
                            .elapsed(started.elapsed())
                            .reference(&candidate.reference),
                    );
                    return Some(Resolution {
                        asset,
                        selected: index,
                        candidates,
                        failures,
                    });
                }
                Err(err) => {
                    warn!(
                        reference = %candidate.reference,
                        kind = %err.kind(),
                        error = %err,
                        "asset candidate failed, moving to next"
                    );
                    self.sink.record(
                        TelemetryEvent::new(Component::Loader, Outcome::CandidateFailed)
                            .attempt(index as u32 + 1)
                            .error(&err)
                            .elapsed(started.elapsed())
                            .reference(&candidate.reference),
                    );
                    if err.kind() == ErrorKind::Capability {
                        unsupported.insert(candidate.format);
                    }
                    failures.push(CandidateFailure {
                        reference: candidate.reference.clone(),
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        Some(self.placeholder(chain, placeholder_at, candidates, failures))
    }

    async fn load(&self, candidate: &AssetCandidate) -> Result<LoadedAsset, ApiError> {
        let fetcher = &self.fetcher;
        let reference = candidate.reference.as_str();
        let payload = self
            .policy
            .execute(move || fetcher.fetch(reference))
            .await?;

        let summary = inspect_glb(&payload)?;
        let model = self.renderer.accept(candidate, &payload, &summary)?;
        debug!(
            reference,
            bytes = payload.len(),
            meshes = summary.mesh_count,
            generator = summary.generator.as_deref().unwrap_or("unknown"),
            "asset validated"
        );

        Ok(LoadedAsset {
            reference: candidate.reference.clone(),
            format: candidate.format,
            fidelity: Fidelity::Full,
            model,
            digest: Some(blake3::hash(&payload).to_hex().to_string()),
            byte_len: payload.len(),
        })
    }

    fn placeholder(
        &self,
        chain: &AssetChain,
        index: usize,
        mut candidates: Vec<AssetCandidate>,
        failures: Vec<CandidateFailure>,
    ) -> Resolution {
        if candidates.is_empty() {
            candidates = chain.candidates().to_vec();
        }
        candidates[index].attempted = true;
        let candidate = &candidates[index];
        let shape = candidate.placeholder_shape();

        info!(
            shape = %shape,
            failed_candidates = failures.len(),
            "showing procedural placeholder"
        );
        let mut event = TelemetryEvent::new(Component::Loader, Outcome::Fallback)
            .attempt(index as u32 + 1)
            .reference(&candidate.reference);
        if let Some(last) = failures.last() {
            event = event.error_kind(last.kind);
        }
        self.sink.record(event);

        let asset = LoadedAsset {
            reference: candidate.reference.clone(),
            format: AssetFormat::Procedural,
            fidelity: Fidelity::Placeholder,
            model: self.renderer.procedural(shape),
            digest: None,
            byte_len: 0,
        };
        Resolution {
            asset,
            selected: index,
            candidates,
            failures,
        }
    }

    fn skipped(&self, index: usize, candidate: &AssetCandidate, reason: &str) {
        debug!(reference = %candidate.reference, reason, "skipping asset candidate");
        self.sink.record(
            TelemetryEvent::new(Component::Loader, Outcome::CandidateSkipped)
                .attempt(index as u32 + 1)
                .reference(&candidate.reference)
                .message(reason),
        );
    }

    fn abandoned(&self, index: usize) {
        debug!(position = index, "asset resolution abandoned");
        self.sink.record(
            TelemetryEvent::new(Component::Loader, Outcome::Abandoned).attempt(index as u32 + 1),
        );
    }
}
