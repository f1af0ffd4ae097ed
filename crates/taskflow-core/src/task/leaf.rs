//! Leaf task: wraps one caller-supplied async action.

use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};

use super::{Node, Settle, Task, TaskValue};
use crate::domain::{BoxError, CancellationError, TaskError, TaskResult};

type Action<T> = Box<dyn FnOnce() -> BoxFuture<'static, Result<T, BoxError>> + Send>;

pub(crate) struct LeafNode<T> {
    action: Action<T>,
}

#[async_trait]
impl<T: TaskValue> Node<T> for LeafNode<T> {
    async fn evaluate(self: Box<Self>, settle: Settle<T>) -> TaskResult<T> {
        let Self { action } = *self;
        match action().await {
            Ok(value) => settle.complete(value),
            Err(error) => match TaskError::from_action(error) {
                TaskError::Cancelled(cancelled) => settle.cancel(cancelled),
                other => settle.fault(other),
            },
        }
    }
}

static COMPLETED: LazyLock<Task<()>> = LazyLock::new(|| Task::settled(TaskResult::completed(())));

impl<T: TaskValue> Task<T> {
    /// Wrap an async action.
    ///
    /// `Ok` completes the task. An error that is a `CancellationError`
    /// cancels it; any other error faults it.
    pub fn new<F, Fut, E>(action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        let action: Action<T> = Box::new(move || {
            action()
                .map(|result| result.map_err(Into::into))
                .boxed()
        });
        Task::from_node(LeafNode { action })
    }

    pub fn from_result(value: T) -> Self {
        Task::new(move || async move { Ok::<_, BoxError>(value) })
    }

    /// Faults on execution; a `CancellationError` cancels instead, as with
    /// [`Task::new`].
    pub fn from_error(error: impl Into<BoxError>) -> Self {
        let error = error.into();
        Task::new(move || async move { Err::<T, _>(error) })
    }

    pub fn from_cancelled(reason: Option<String>) -> Self {
        Task::new(move || async move { Err::<T, _>(CancellationError::new(reason)) })
    }
}

impl Task<()> {
    /// Completes after `duration`.
    pub fn delay(duration: Duration) -> Self {
        Task::new(move || async move {
            tokio::time::sleep(duration).await;
            Ok::<_, BoxError>(())
        })
    }

    /// The shared, already-executed completed task.
    pub fn completed() -> Self {
        COMPLETED.clone()
    }
}
