use crate::core::SaveError;
use log::error;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::runtime::{Handle, TryCurrentError};
use tokio::task::JoinHandle;

/// Pending result of a save.
///
/// Await it to get the success flag, hand it a completion callback with
/// [`on_complete`](Self::on_complete), or [`detach`](Self::detach) it. The work
/// keeps running either way.
#[must_use = "a SaveTask reports whether the save succeeded; use detach() to ignore it"]
pub struct SaveTask {
    state: TaskState,
}

enum TaskState {
    Ready(bool),
    Running(JoinHandle<bool>),
    Done,
}

impl SaveTask {
    /// Already-finished task.
    pub fn ready(success: bool) -> Self {
        Self {
            state: TaskState::Ready(success),
        }
    }

    /// Runs blocking I/O on tokio's blocking pool. Outside a runtime the work
    /// is not run and the task resolves to `false`.
    pub(crate) fn spawn_blocking<F>(work: F) -> Self
    where
        F: FnOnce() -> bool + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => Self {
                state: TaskState::Running(handle.spawn_blocking(work)),
            },
            Err(err) => Self::no_runtime(err),
        }
    }

    /// Outside a runtime the work is not run and the task resolves to `false`.
    pub(crate) fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = bool> + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => Self {
                state: TaskState::Running(handle.spawn(work)),
            },
            Err(err) => Self::no_runtime(err),
        }
    }

    /// Fire and forget: `callback` receives the result once the save finishes.
    ///
    /// Outside a runtime a ready task reports its result right away and any
    /// other task reports `false`.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let success = self.await;
                    callback(success);
                });
            }
            Err(err) => {
                let success = match self.state {
                    TaskState::Ready(success) => success,
                    TaskState::Running(_) | TaskState::Done => {
                        error!("{}", SaveError::WorkerError(err.to_string()));
                        false
                    }
                };
                callback(success);
            }
        }
    }

    fn no_runtime(err: TryCurrentError) -> Self {
        error!("{}", SaveError::WorkerError(err.to_string()));
        Self::ready(false)
    }

    pub fn detach(self) {}

    pub fn is_finished(&self) -> bool {
        match &self.state {
            TaskState::Ready(_) | TaskState::Done => true,
            TaskState::Running(handle) => handle.is_finished(),
        }
    }
}

impl Future for SaveTask {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        let this = &mut *self;
        match &mut this.state {
            TaskState::Ready(success) => {
                let success = *success;
                this.state = TaskState::Done;
                Poll::Ready(success)
            }
            TaskState::Running(handle) => match Pin::new(handle).poll(cx) {
                Poll::Ready(result) => {
                    this.state = TaskState::Done;
                    Poll::Ready(result.unwrap_or_else(|err| {
                        error!("{}", SaveError::WorkerError(err.to_string()));
                        false
                    }))
                }
                Poll::Pending => Poll::Pending,
            },
            TaskState::Done => Poll::Ready(false),
        }
    }
}
