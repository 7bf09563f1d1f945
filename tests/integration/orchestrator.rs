//! Task lifecycle: submission, polling cadence, observers, discard and supersession.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use atelier::error::{ApiError, ErrorKind};
use atelier::generation::{
    AssetBundle, GenerationOrchestrator, OrchestratorConfig, StatusReport, TaskKind, TaskStatus,
    TaskView,
};
use atelier::provider::{GenerationPayload, GenerationService, TaskTicket};
use atelier::telemetry::{Component, Outcome, SharedSink};

use super::support::{fast_policy, memory_sink, ExplodingSink, ScriptedService};

fn orchestrator(
    service: Arc<dyn GenerationService>,
    config: OrchestratorConfig,
    sink: &SharedSink,
) -> GenerationOrchestrator {
    GenerationOrchestrator::new(
        service,
        fast_policy("submit", 3, sink),
        fast_policy("poll", 3, sink),
        config,
        Arc::clone(sink),
    )
    .unwrap()
}

fn photos() -> GenerationPayload {
    GenerationPayload::new(vec!["front.jpg".into(), "side.jpg".into()])
}

fn transport() -> Result<StatusReport, ApiError> {
    Err(ApiError::Transport("connection reset".into()))
}

#[tokio::test(start_paused = true)]
async fn test_progress_then_completion_notifies_three_times() {
    let bundle = AssetBundle::new("https://cdn.example/body.glb").with_mirror("https://mirror.example/body.glb");
    let service = Arc::new(ScriptedService::with_statuses(vec![
        Ok(StatusReport::processing(10)),
        Ok(StatusReport::processing(55)),
        Ok(StatusReport::completed(bundle.clone())),
    ]));
    let (memory, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();
    assert_eq!(handle.status(), TaskStatus::Queued);
    assert_eq!(handle.id(), "task-1");

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        handle.on_task_update(move |task| {
            seen.lock()
                .push((task.status, task.progress, task.result.clone()));
        });
    }

    let task = handle.wait_terminal().await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.view(), TaskView::Ready(&bundle));

    let seen = seen.lock().clone();
    assert_eq!(seen.len(), 3);
    assert_eq!((seen[0].0, seen[0].1), (TaskStatus::Processing, 10));
    assert_eq!((seen[1].0, seen[1].1), (TaskStatus::Processing, 55));
    assert_eq!(seen[2].0, TaskStatus::Completed);
    assert_eq!(seen[2].2.as_ref(), Some(&bundle));

    // No polling after the terminal transition.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(service.status_calls(), 3);
    assert!(orch.active(TaskKind::BodyFromImages).is_none());
    assert_eq!(memory.matching(Component::Orchestrator, Outcome::Completed).len(), 1);
    assert_eq!(memory.matching(Component::Orchestrator, Outcome::Submitted).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_polls_are_spaced_by_the_configured_interval() {
    let service = Arc::new(ScriptedService::with_statuses(vec![
        Ok(StatusReport::processing(10)),
        Ok(StatusReport::processing(20)),
        Ok(StatusReport::completed(AssetBundle::new("https://cdn/x.glb"))),
    ]));
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let started = tokio::time::Instant::now();
    let handle = orch.submit(TaskKind::BodyFromVideo, &GenerationPayload::new(vec!["walk.mp4".into()]))
        .await
        .unwrap();
    handle.wait_terminal().await.unwrap();

    // First poll right away, then two 3s waits.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_is_a_remote_job_error_delivered_once() {
    let service = Arc::new(ScriptedService::with_statuses(vec![
        Ok(StatusReport::processing(40)),
        Ok(StatusReport::failed("could not detect a person in the photos")),
    ]));
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);
    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    let terminal_calls = Arc::new(AtomicU32::new(0));
    {
        let terminal_calls = Arc::clone(&terminal_calls);
        handle.on_task_update(move |task| {
            if task.is_terminal() {
                terminal_calls.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let task = handle.wait_terminal().await.unwrap();
    let error = task.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::RemoteJob);
    assert!(error.message.contains("could not detect"));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(terminal_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.status_calls(), 2);

    // A late observer still hears about the terminal state, once.
    let late = Arc::new(AtomicU32::new(0));
    {
        let late = Arc::clone(&late);
        handle.on_task_update(move |_| {
            late.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(late.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_poll_retries_keep_the_task_waiting() {
    let service = Arc::new(ScriptedService::with_statuses(vec![
        Ok(StatusReport::processing(25)),
        transport(),
        transport(),
        transport(),
        Ok(StatusReport::processing(80)),
        Ok(StatusReport::completed(AssetBundle::new("https://cdn/shirt.glb"))),
    ]));
    let (memory, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);
    let handle = orch
        .submit(TaskKind::ClothingFromImage, &GenerationPayload::new(vec!["shirt.jpg".into()]))
        .await
        .unwrap();

    let mut rx = handle.subscribe();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().progress, 25);

    // The second poll uses all three attempts and gives up.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(service.status_calls(), 4);
    assert_eq!(handle.status(), TaskStatus::Processing);
    assert_eq!(handle.snapshot().progress, 25);
    assert_eq!(memory.matching(Component::Orchestrator, Outcome::PollDeferred).len(), 1);

    let task = handle.wait_terminal().await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(service.status_calls(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_revoked_authorization_fails_the_task() {
    let service = Arc::new(ScriptedService::with_statuses(vec![Err(ApiError::Unauthorized(
        "403 Forbidden".into(),
    ))]));
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);
    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    let task = handle.wait_terminal().await.unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.unwrap().kind, ErrorKind::Authorization);
    assert_eq!(service.status_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_ceiling_fails_with_transport_error() {
    let service = Arc::new(ScriptedService::new().when_exhausted(transport));
    let (_, sink) = memory_sink();
    let config = OrchestratorConfig {
        poll_interval_ms: 1_000,
        max_unreachable_ms: Some(10_000),
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(service.clone(), config, &sink);
    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    let task = handle.wait_terminal().await.unwrap();
    let error = task.error.unwrap();
    assert_eq!(error.kind, ErrorKind::Transport);
    assert!(error.message.contains("service unreachable"));
}

#[tokio::test(start_paused = true)]
async fn test_without_a_ceiling_unreachable_service_never_fails_the_task() {
    let service = Arc::new(ScriptedService::new().when_exhausted(transport));
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);
    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(!handle.is_terminal());
    assert!(service.status_calls() > 100);
    handle.discard();
}

#[tokio::test(start_paused = true)]
async fn test_discard_stops_polling_without_failing_the_task() {
    let service = Arc::new(ScriptedService::new());
    let (memory, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);
    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(7)).await;
    let calls_at_discard = service.status_calls();
    assert_eq!(calls_at_discard, 3);

    handle.discard();
    assert!(handle.wait_terminal().await.is_none());
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(service.status_calls(), calls_at_discard);
    assert_eq!(handle.status(), TaskStatus::Processing);
    assert_eq!(memory.matching(Component::Orchestrator, Outcome::Abandoned).len(), 1);
    assert!(orch.active(TaskKind::BodyFromImages).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_new_task_of_same_kind_supersedes_the_old_one() {
    let service = Arc::new(ScriptedService::new());
    let (memory, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let first = orch.submit(TaskKind::ClothingFromVideo, &GenerationPayload::new(vec!["a.mp4".into()]))
        .await
        .unwrap();
    let other_kind = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();
    let second = orch.submit(TaskKind::ClothingFromVideo, &GenerationPayload::new(vec!["b.mp4".into()]))
        .await
        .unwrap();

    assert!(first.is_discarded());
    assert!(!second.is_discarded());
    assert!(!other_kind.is_discarded());
    assert!(orch.active(TaskKind::ClothingFromVideo).unwrap().same_task(&second));
    assert_eq!(memory.matching(Component::Orchestrator, Outcome::Superseded).len(), 1);

    orch.discard_all();
    assert!(second.is_discarded() && other_kind.is_discarded());
}

#[tokio::test(start_paused = true)]
async fn test_discard_all_reaches_every_task_when_supersession_is_off() {
    let service = Arc::new(ScriptedService::new());
    let (memory, sink) = memory_sink();
    let config = OrchestratorConfig {
        supersede_same_kind: false,
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(service.clone(), config, &sink);

    let first = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();
    let second = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    assert!(!first.is_discarded());
    assert!(orch.active(TaskKind::BodyFromImages).unwrap().same_task(&second));
    assert_eq!(orch.active_all(TaskKind::BodyFromImages).len(), 2);
    assert!(memory.matching(Component::Orchestrator, Outcome::Superseded).is_empty());

    tokio::time::sleep(Duration::from_secs(1)).await;
    orch.discard_all();
    let calls_at_discard = service.status_calls();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(first.is_discarded() && second.is_discarded());
    assert_eq!(service.status_calls(), calls_at_discard);
    assert!(orch.active(TaskKind::BodyFromImages).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_finished_task_leaves_its_siblings_tracked() {
    let service = Arc::new(ScriptedService::with_statuses(vec![Ok(StatusReport::completed(
        AssetBundle::new("https://cdn/a.glb"),
    ))]));
    let (_, sink) = memory_sink();
    let config = OrchestratorConfig {
        supersede_same_kind: false,
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(service.clone(), config, &sink);

    let first = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();
    first.wait_terminal().await.unwrap();
    let second = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let tracked = orch.active_all(TaskKind::BodyFromImages);
    assert_eq!(tracked.len(), 1);
    assert!(tracked[0].same_task(&second));
    orch.discard_all();
}

#[tokio::test(start_paused = true)]
async fn test_panicking_sink_does_not_stop_the_poll_loop() {
    let service = Arc::new(ScriptedService::with_statuses(vec![
        Ok(StatusReport::processing(30)),
        Ok(StatusReport::completed(AssetBundle::new("https://cdn/a.glb"))),
    ]));
    let sink: SharedSink = Arc::new(ExplodingSink);
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();
    let task = handle.wait_terminal().await.unwrap();

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(service.status_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_submission_failure_creates_no_task() {
    let service = Arc::new(ScriptedService::new().with_submits(vec![
        Err(ApiError::Transport("timeout".into())),
        Err(ApiError::Transport("timeout".into())),
        Err(ApiError::Transport("timeout".into())),
    ]));
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let err = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(service.submit_calls(), 3);
    assert!(orch.active(TaskKind::BodyFromImages).is_none());
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(service.status_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_submission_is_not_retried() {
    let service = Arc::new(
        ScriptedService::new().with_submits(vec![Err(ApiError::Unauthorized("401".into()))]),
    );
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let err = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert_eq!(service.submit_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_never_reaches_the_service() {
    let service = Arc::new(ScriptedService::new());
    let (_, sink) = memory_sink();
    let orch = orchestrator(service.clone(), OrchestratorConfig::default(), &sink);

    let err = orch
        .submit(TaskKind::ClothingFromImage, &photos())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidRequest(_)));
    assert_eq!(service.submit_calls(), 0);
}

/// Service whose status call takes longer than the poll interval.
struct SlowService {
    in_flight: AtomicU32,
    max_in_flight: AtomicU32,
    calls: AtomicU32,
}

#[async_trait]
impl GenerationService for SlowService {
    async fn submit(
        &self,
        _kind: TaskKind,
        _payload: &GenerationPayload,
    ) -> Result<TaskTicket, ApiError> {
        Ok(TaskTicket {
            task_id: "slow-1".to_string(),
        })
    }

    async fn status(&self, _task_id: &str) -> Result<StatusReport, ApiError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StatusReport::processing((n * 10).min(90) as u8))
    }

    fn service_name(&self) -> &str {
        "slow"
    }
}

#[tokio::test(start_paused = true)]
async fn test_at_most_one_poll_in_flight_for_a_slow_service() {
    let service = Arc::new(SlowService {
        in_flight: AtomicU32::new(0),
        max_in_flight: AtomicU32::new(0),
        calls: AtomicU32::new(0),
    });
    let (_, sink) = memory_sink();
    let config = OrchestratorConfig {
        poll_interval_ms: 1_000,
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(service.clone(), config, &sink);
    let handle = orch.submit(TaskKind::BodyFromImages, &photos()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    handle.discard();

    assert_eq!(service.max_in_flight.load(Ordering::SeqCst), 1);
    // Each cycle is one 10s call plus the 1s interval.
    let calls = service.calls.load(Ordering::SeqCst);
    assert!((5..=6).contains(&calls), "unexpected poll count {}", calls);
}
