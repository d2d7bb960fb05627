//! Cancellable background jobs with progress reporting.
//!
//! Long-running work (sample decoding, feature extraction, training) runs on
//! a worker thread wrapped in a [`Task`]. Progress flows out through a
//! bounded crossbeam channel; cancellation is cooperative, checked by the
//! worker at defined checkpoints rather than by interrupting the thread. A
//! cancelled task produces no partial result.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::Mutex;
use strum::Display;
use thiserror::Error;

/// Lifecycle of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TaskState {
    Idle,
    Running,
    Cancelled,
    Completed,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::Failed)
    }
}

/// Checkpoint notifications emitted while a job runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Cumulative PCM samples decoded so far.
    SamplesDecoded(usize),
    /// Cumulative feature frames extracted so far.
    FramesExtracted(usize),
    /// One k-means pass finished.
    TrainingIteration {
        iteration: usize,
        quantization_error: f64,
    },
}

/// Worker outcome. `Cancelled` is a normal shutdown path, not a fault.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("task cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(E),
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Handed to the worker closure: progress sink plus cancellation checks.
pub struct TaskContext {
    cancel: CancelToken,
    events: Sender<ProgressEvent>,
}

impl TaskContext {
    /// A context with no listener and no way to cancel, for callers running
    /// pipeline stages synchronously.
    pub fn detached() -> Self {
        Self {
            cancel: CancelToken::new(),
            events: bounded(0).0,
        }
    }

    /// Report progress. Dropped silently if the channel is full or the
    /// listener has gone away; progress must never stall the worker.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.events.try_send(event);
    }

    /// Bail out with `TaskError::Cancelled` if cancellation was requested.
    pub fn checkpoint<E>(&self) -> Result<(), TaskError<E>> {
        if self.cancel.is_cancelled() {
            Err(TaskError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A spawned job. Owns the worker thread until [`Task::join`].
pub struct Task<T, E> {
    state: Arc<Mutex<TaskState>>,
    cancel: CancelToken,
    events: Receiver<ProgressEvent>,
    handle: thread::JoinHandle<Result<T, TaskError<E>>>,
}

/// Events buffered between worker and observer.
const EVENT_CAPACITY: usize = 64;

impl<T, E> Task<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Run `work` on a new thread. The closure sees a [`TaskContext`] and is
    /// expected to call [`TaskContext::checkpoint`] at every progress point.
    pub fn spawn<F>(work: F) -> Self
    where
        F: FnOnce(&TaskContext) -> Result<T, TaskError<E>> + Send + 'static,
    {
        let state = Arc::new(Mutex::new(TaskState::Idle));
        let cancel = CancelToken::new();
        let (tx, rx) = bounded(EVENT_CAPACITY);

        let ctx = TaskContext {
            cancel: cancel.clone(),
            events: tx,
        };
        let thread_state = Arc::clone(&state);
        let handle = thread::spawn(move || {
            *thread_state.lock() = TaskState::Running;
            let result = work(&ctx);
            *thread_state.lock() = match &result {
                Ok(_) => TaskState::Completed,
                Err(TaskError::Cancelled) => TaskState::Cancelled,
                Err(TaskError::Failed(_)) => TaskState::Failed,
            };
            result
        });

        Self {
            state,
            cancel,
            events: rx,
            handle,
        }
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Request cooperative cancellation. Takes effect at the worker's next
    /// checkpoint.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Progress event stream. Disconnects when the worker finishes.
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<T, TaskError<E>> {
        match self.handle.join() {
            Ok(result) => result,
            // propagate a worker panic to the joining thread
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}
