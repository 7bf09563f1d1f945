//! Generation Task Orchestrator
//!
//! Lifecycle of remote generation jobs: submission, the per-task poll loop,
//! and the handle through which callers observe progress.

pub mod handle;
pub mod orchestrator;
pub mod task;

pub use handle::{TaskHandle, TaskObserver};
pub use orchestrator::{GenerationOrchestrator, OrchestratorConfig};
pub use task::{
    AssetBundle, GenerationTask, StatusReport, TaskError, TaskKind, TaskStatus, TaskView,
    Transition,
};
