//! Shared handle to one generation task.
//!
//! The poll loop is the only writer. Everyone else reads snapshots, registers
//! observers, or waits for the terminal state.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::time::sleep;

use crate::abandon::AbandonToken;
use crate::error::ErrorKind;
use crate::generation::task::{GenerationTask, StatusReport, TaskKind, TaskStatus, Transition};

/// Callback invoked with the latest task snapshot.
pub type TaskObserver = Arc<dyn Fn(&GenerationTask) + Send + Sync>;

struct TaskShared {
    updates: watch::Sender<GenerationTask>,
    observers: Mutex<Vec<TaskObserver>>,
    abandon: AbandonToken,
    wake: Notify,
}

#[derive(Clone)]
pub struct TaskHandle {
    shared: Arc<TaskShared>,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task", &*self.shared.updates.borrow())
            .field("discarded", &self.is_discarded())
            .finish()
    }
}

impl TaskHandle {
    pub(crate) fn new(task: GenerationTask) -> Self {
        let (updates, _) = watch::channel(task);
        Self {
            shared: Arc::new(TaskShared {
                updates,
                observers: Mutex::new(Vec::new()),
                abandon: AbandonToken::new(),
                wake: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> String {
        self.shared.updates.borrow().id.clone()
    }

    pub fn kind(&self) -> TaskKind {
        self.shared.updates.borrow().kind
    }

    pub fn status(&self) -> TaskStatus {
        self.shared.updates.borrow().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn snapshot(&self) -> GenerationTask {
        self.shared.updates.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<GenerationTask> {
        self.shared.updates.subscribe()
    }

    /// Register a callback for status and progress changes.
    ///
    /// The terminal transition is delivered exactly once. Registering on a
    /// task that is already terminal invokes the callback immediately with
    /// the terminal snapshot. Callbacks run on the poll loop and must not block.
    pub fn on_task_update<F>(&self, callback: F)
    where
        F: Fn(&GenerationTask) + Send + Sync + 'static,
    {
        let mut observers = self.shared.observers.lock();
        let snapshot = self.shared.updates.borrow().clone();
        if snapshot.is_terminal() {
            drop(observers);
            callback(&snapshot);
            return;
        }
        observers.push(Arc::new(callback));
    }

    /// Stream of snapshots, one per published change, ending after the
    /// terminal snapshot or when the task is discarded. On a task that is
    /// already terminal it yields the terminal snapshot once.
    pub fn updates(&self) -> impl Stream<Item = GenerationTask> + Send + 'static {
        let rx = self.shared.updates.subscribe();
        let start = rx.borrow().clone();
        let initial = start.is_terminal().then_some(start);
        stream::unfold(
            (rx, self.clone(), initial, false),
            |(mut rx, handle, initial, done)| async move {
                if done {
                    return None;
                }
                if let Some(task) = initial {
                    return Some((task, (rx, handle, None, true)));
                }
                if handle.is_discarded() || rx.changed().await.is_err() {
                    return None;
                }
                let task = rx.borrow_and_update().clone();
                if handle.is_discarded() && !task.is_terminal() {
                    return None;
                }
                let done = task.is_terminal();
                Some((task, (rx, handle, None, done)))
            },
        )
    }

    /// Wait until the task is terminal. Returns `None` if the task is
    /// discarded first.
    pub async fn wait_terminal(&self) -> Option<GenerationTask> {
        let mut rx = self.shared.updates.subscribe();
        loop {
            {
                let task = rx.borrow_and_update();
                if task.is_terminal() {
                    return Some(task.clone());
                }
            }
            if self.is_discarded() {
                return None;
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Stop polling this task. The remote job keeps running; a poll already in
    /// flight completes and its result is dropped.
    pub fn discard(&self) {
        self.shared.abandon.abandon();
        self.shared.wake.notify_one();
        self.shared.updates.send_modify(|_| {});
    }

    pub fn is_discarded(&self) -> bool {
        self.shared.abandon.is_abandoned()
    }

    pub fn same_task(&self, other: &TaskHandle) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn apply(&self, report: StatusReport) -> Transition {
        self.publish(|task| task.apply_report(report))
    }

    pub(crate) fn fail(&self, kind: ErrorKind, message: impl Into<String>) -> bool {
        let message = message.into();
        self.publish(|task| {
            if task.fail(kind, message) {
                Transition::Terminal
            } else {
                Transition::Unchanged
            }
        }) == Transition::Terminal
    }

    /// Sleep for `interval`, returning early if the task is discarded.
    pub(crate) async fn pause(&self, interval: Duration) {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = self.shared.wake.notified() => {}
        }
    }

    fn publish<F>(&self, mutate: F) -> Transition
    where
        F: FnOnce(&mut GenerationTask) -> Transition,
    {
        let (transition, observers, snapshot) = {
            let mut observers = self.shared.observers.lock();
            let mut transition = Transition::Unchanged;
            self.shared.updates.send_if_modified(|task| {
                transition = mutate(task);
                transition != Transition::Unchanged
            });
            let to_notify = match transition {
                Transition::Unchanged => Vec::new(),
                Transition::Progressed => observers.clone(),
                // Nothing can change after the terminal transition.
                Transition::Terminal => std::mem::take(&mut *observers),
            };
            (transition, to_notify, self.shared.updates.borrow().clone())
        };

        for observer in observers {
            observer(&snapshot);
        }
        transition
    }
}
