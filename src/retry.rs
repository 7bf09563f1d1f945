//! Retry Policy
//!
//! Bounded, exponentially backed-off retries around a single network
//! operation. Every network call in the crate (task submission, status polls,
//! asset downloads) goes through a [`RetryPolicy`] configured for its call site.

mod backoff;

pub use backoff::{RetryConfig, RetryContext};

use std::future::Future;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::telemetry::{guarded, Component, Outcome, SharedSink, TelemetryEvent};

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retryable,
    Terminal,
}

/// Default classification: transport problems are retryable, everything else
/// (authorization, capability, remote job failure, validation) is terminal.
pub fn default_classify(error: &ApiError) -> RetryDecision {
    if error.kind().is_retryable() {
        RetryDecision::Retryable
    } else {
        RetryDecision::Terminal
    }
}

/// Retry policy for one call site.
#[derive(Clone)]
pub struct RetryPolicy {
    label: String,
    config: RetryConfig,
    sink: SharedSink,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("label", &self.label)
            .field("config", &self.config)
            .finish()
    }
}

impl RetryPolicy {
    /// Create a policy. Rejects `max_attempts < 1`. A panic inside `sink` is
    /// contained and never reaches the guarded operation.
    pub fn new(
        label: impl Into<String>,
        config: RetryConfig,
        sink: SharedSink,
    ) -> Result<Self, ApiError> {
        config.validate()?;
        Ok(Self {
            label: label.into(),
            config,
            sink: guarded(sink),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` with the default classification.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.execute_with(operation, default_classify).await
    }

    /// Run `operation` until it succeeds, `classify` calls an error terminal,
    /// or `max_attempts` is exhausted. The last error is returned as-is.
    pub async fn execute_with<T, F, Fut, C>(
        &self,
        mut operation: F,
        classify: C,
    ) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        C: Fn(&ApiError) -> RetryDecision,
    {
        let started = Instant::now();
        let mut ctx = RetryContext::new(&self.config);

        loop {
            let result = match self.config.attempt_timeout() {
                Some(limit) => match timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::Timeout(limit)),
                },
                None => operation().await,
            };

            let err = match result {
                Ok(value) => {
                    if ctx.attempt > 1 {
                        debug!(
                            label = %self.label,
                            attempt = ctx.attempt,
                            "operation recovered after retry"
                        );
                    }
                    self.sink.record(
                        TelemetryEvent::new(Component::RetryPolicy, Outcome::Success)
                            .attempt(ctx.attempt)
                            .elapsed(started.elapsed())
                            .label(&self.label),
                    );
                    return Ok(value);
                }
                Err(err) => err,
            };

            let decision = classify(&err);
            if decision == RetryDecision::Terminal || ctx.is_last_attempt() {
                warn!(
                    label = %self.label,
                    attempt = ctx.attempt,
                    max_attempts = ctx.max_attempts,
                    terminal = decision == RetryDecision::Terminal,
                    error = %err,
                    "operation failed"
                );
                self.sink.record(
                    TelemetryEvent::new(Component::RetryPolicy, Outcome::Failure)
                        .attempt(ctx.attempt)
                        .error(&err)
                        .elapsed(started.elapsed())
                        .label(&self.label),
                );
                return Err(err);
            }

            let delay = ctx.backoff_delay();
            debug!(
                label = %self.label,
                attempt = ctx.attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "retrying operation"
            );
            self.sink.record(
                TelemetryEvent::new(Component::RetryPolicy, Outcome::Retry)
                    .attempt(ctx.attempt)
                    .error(&err)
                    .elapsed(started.elapsed())
                    .delay(delay)
                    .label(&self.label),
            );
            sleep(delay).await;
            ctx.advance();
        }
    }
}
