//! Retry bound, backoff schedule and classification across call sites.

use proptest::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atelier::error::ApiError;
use atelier::retry::{RetryConfig, RetryDecision, RetryPolicy};
use atelier::telemetry::{Component, Outcome};

use super::support::{memory_sink, ExplodingSink};

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_operation_runs_between_one_and_max_attempts(
        max_attempts in 1u32..8,
        fail_first in 0u32..10,
        retryable in any::<bool>(),
    ) {
        let calls = AtomicU32::new(0);
        let (_, sink) = memory_sink();
        let policy = RetryPolicy::new(
            "prop",
            RetryConfig::new(max_attempts, Duration::from_millis(5)),
            sink,
        )
        .unwrap();

        let result = paused_runtime().block_on(policy.execute(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < fail_first {
                    if retryable {
                        Err(ApiError::Transport("reset".into()))
                    } else {
                        Err(ApiError::Capability("no webgl".into()))
                    }
                } else {
                    Ok(n)
                }
            }
        }));

        let calls = calls.load(Ordering::SeqCst);
        prop_assert!(calls >= 1);
        prop_assert!(calls <= max_attempts);
        if fail_first == 0 {
            prop_assert_eq!(calls, 1);
            prop_assert!(result.is_ok());
        } else if !retryable {
            prop_assert_eq!(calls, 1);
            prop_assert!(result.is_err());
        } else if fail_first < max_attempts {
            prop_assert_eq!(calls, fail_first + 1);
            prop_assert!(result.is_ok());
        } else {
            prop_assert_eq!(calls, max_attempts);
            prop_assert!(result.is_err());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_three_attempts_wait_twice_with_doubling_delay() {
    let (memory, sink) = memory_sink();
    let policy = RetryPolicy::new(
        "poll",
        RetryConfig::new(3, Duration::from_millis(500)),
        sink,
    )
    .unwrap();
    let calls = Arc::new(AtomicU32::new(0));

    let started = tokio::time::Instant::now();
    let result: Result<(), ApiError> = policy
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Transport("503 Service Unavailable".into())) }
        })
        .await;

    assert!(matches!(result, Err(ApiError::Transport(msg)) if msg.contains("503")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(1500) && waited < Duration::from_millis(1600));

    let retries = memory.matching(Component::RetryPolicy, Outcome::Retry);
    assert_eq!(retries.len(), 2);
    assert_eq!(retries[0].attempt, 1);
    assert_eq!(retries[1].attempt, 2);
    assert_eq!(retries[1].delay_ms, Some(1000));

    let failure = memory.matching(Component::RetryPolicy, Outcome::Failure);
    assert_eq!(failure.len(), 1);
    assert_eq!(failure[0].attempt, 3);
    assert_eq!(failure[0].label.as_deref(), Some("poll"));
    // Elapsed time follows the runtime clock, paused or not.
    assert!(failure[0].duration_ms >= 1500 && failure[0].duration_ms < 1600);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_sink_does_not_disturb_retries() {
    let policy = RetryPolicy::new(
        "submit",
        RetryConfig::new(3, Duration::from_millis(10)),
        Arc::new(ExplodingSink),
    )
    .unwrap();
    let calls = AtomicU32::new(0);

    let value = policy
        .execute(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Transport("reset".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(value, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delay_is_capped_at_max_delay() {
    let (_, sink) = memory_sink();
    let config = RetryConfig::new(6, Duration::from_secs(10)).with_max_delay(Duration::from_secs(30));
    let policy = RetryPolicy::new("capped", config, sink).unwrap();

    let started = tokio::time::Instant::now();
    let _: Result<(), ApiError> = policy
        .execute(|| async { Err(ApiError::Timeout(Duration::from_secs(1))) })
        .await;

    // 10 + 20 + 30 + 30 + 30
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(120) && waited < Duration::from_secs(121));
}

#[tokio::test(start_paused = true)]
async fn test_authorization_error_is_surfaced_after_one_attempt() {
    let (memory, sink) = memory_sink();
    let policy = RetryPolicy::new("submit", RetryConfig::new(5, Duration::from_secs(1)), sink)
        .unwrap();
    let calls = AtomicU32::new(0);

    let result: Result<(), ApiError> = policy
        .execute(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ApiError::Unauthorized("401 token expired".into())) }
        })
        .await;

    assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(memory.matching(Component::RetryPolicy, Outcome::Retry).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_classifier_can_make_remote_errors_retryable() {
    let (_, sink) = memory_sink();
    let policy = RetryPolicy::new("custom", RetryConfig::new(3, Duration::from_millis(1)), sink)
        .unwrap();
    let calls = AtomicU32::new(0);

    let result = policy
        .execute_with(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ApiError::Rejected("409 busy".into()))
                    } else {
                        Ok("done")
                    }
                }
            },
            |_| RetryDecision::Retryable,
        )
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_zero_max_attempts_is_rejected_at_construction() {
    let (_, sink) = memory_sink();
    let config = RetryConfig {
        max_attempts: 0,
        ..RetryConfig::default()
    };
    assert!(matches!(
        RetryPolicy::new("bad", config, sink),
        Err(ApiError::ConfigError(_))
    ));
}
