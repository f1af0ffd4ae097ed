//! Continuation node: runs a child task after a parent settles.

use async_trait::async_trait;

use super::{Node, Settle, Task, TaskValue};
use crate::domain::{DiscontinuationError, TaskContinuationStrategy, TaskResult};

type ChildProvider<P, U> = Box<dyn FnOnce(TaskResult<P>) -> Task<U> + Send>;

pub(crate) struct ContinuationNode<P, U> {
    parent: Task<P>,
    child_provider: ChildProvider<P, U>,
    strategy: TaskContinuationStrategy,
}

impl<P, U> ContinuationNode<P, U> {
    pub(crate) fn new<F>(
        parent: Task<P>,
        child_provider: F,
        strategy: TaskContinuationStrategy,
    ) -> Self
    where
        F: FnOnce(TaskResult<P>) -> Task<U> + Send + 'static,
    {
        Self {
            parent,
            child_provider: Box::new(child_provider),
            strategy,
        }
    }
}

#[async_trait]
impl<P: TaskValue, U: TaskValue> Node<U> for ContinuationNode<P, U> {
    async fn evaluate(self: Box<Self>, settle: Settle<U>) -> TaskResult<U> {
        let Self {
            parent,
            child_provider,
            strategy,
        } = *self;

        let parent_result = match parent.execute().await {
            Ok(result) => result,
            Err(error) => return settle.fault(error),
        };

        if !strategy.permits(parent_result.state()) {
            tracing::debug!(
                task = %settle.id(),
                parent = %parent.id(),
                parent_state = %parent_result.state(),
                ?strategy,
                "continuation discontinued"
            );
            return settle.discontinue(DiscontinuationError::new(parent_result));
        }

        let child = child_provider(parent_result);
        match child.execute().await {
            Ok(result) => settle.adopt(result),
            Err(error) => settle.fault(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use rstest::rstest;

    use crate::domain::{BoxError, TaskError, TaskState};
    use crate::task::Task;
    use crate::TaskContinuationStrategy as S;

    #[derive(Debug, thiserror::Error)]
    #[error("parent failed")]
    struct ParentFailed;

    fn parent_in(state: TaskState) -> Task<u32> {
        match state {
            TaskState::Completed => Task::from_result(1),
            TaskState::Faulted => Task::from_error(ParentFailed),
            TaskState::Cancelled => Task::from_cancelled(Some("parent".to_string())),
            TaskState::Discontinued => {
                Task::from_result(0).then_with(|_| Task::from_result(1), S::NONE)
            }
            other => unreachable!("no terminal parent for {other}"),
        }
    }

    #[rstest]
    #[case::after_completed(TaskState::Completed)]
    #[case::after_faulted(TaskState::Faulted)]
    #[case::after_cancelled(TaskState::Cancelled)]
    #[tokio::test]
    async fn all_strategy_adopts_child_outcome(#[case] parent_state: TaskState) {
        let parent = parent_in(parent_state);
        let child = Task::from_result("child".to_string());
        let expected = child.execute().await.unwrap();

        let seen_state = Arc::new(std::sync::Mutex::new(None));
        let continuation = {
            let child = child.clone();
            let seen_state = Arc::clone(&seen_state);
            parent.then(move |result| {
                *seen_state.lock().unwrap() = Some(result.state());
                child
            })
        };

        let result = continuation.execute().await.unwrap();
        assert_eq!(result, expected);
        assert_eq!(continuation.state(), TaskState::Completed);
        assert_eq!(*seen_state.lock().unwrap(), Some(parent_state));
    }

    #[tokio::test]
    async fn child_failure_is_adopted() {
        let continuation = Task::from_result(1).then(|_| Task::<u8>::from_cancelled(None));
        let result = continuation.execute().await.unwrap();
        assert_eq!(result.state(), TaskState::Cancelled);
        assert_eq!(continuation.state(), TaskState::Cancelled);
    }

    #[rstest]
    #[case(S::ON_ERROR, TaskState::Completed)]
    #[case(S::ON_COMPLETION, TaskState::Faulted)]
    #[case(S::ON_COMPLETION | S::ON_ERROR, TaskState::Cancelled)]
    #[case(S::NONE, TaskState::Completed)]
    #[case(S::ALL, TaskState::Discontinued)]
    #[tokio::test]
    async fn rejected_parent_discontinues(#[case] strategy: S, #[case] parent_state: TaskState) {
        let parent = parent_in(parent_state);
        let provider_called = Arc::new(AtomicBool::new(false));
        let continuation = {
            let provider_called = Arc::clone(&provider_called);
            parent.then_with(
                move |_| {
                    provider_called.store(true, Ordering::SeqCst);
                    Task::from_result(())
                },
                strategy,
            )
        };

        let result = continuation.execute().await.unwrap();
        let parent_result = parent.execute().await.unwrap();

        assert_eq!(result.state(), TaskState::Discontinued);
        assert_eq!(continuation.state(), TaskState::Discontinued);
        assert!(!provider_called.load(Ordering::SeqCst));

        let discontinued = result.error().and_then(TaskError::as_discontinuation).unwrap();
        assert_eq!(discontinued.parent_state(), parent_state);
        assert_eq!(discontinued.parent_result::<u32>(), Some(&parent_result));
    }

    #[tokio::test]
    async fn parent_panic_faults_continuation() {
        let parent: Task<u32> = Task::new(|| -> futures::future::Ready<Result<u32, BoxError>> {
            panic!("parent machinery")
        });
        let continuation = parent.then(|_| Task::from_result(1u32));

        let result = continuation.execute().await.unwrap();
        assert_eq!(result.state(), TaskState::Faulted);
        assert_eq!(
            result.error(),
            Some(&TaskError::Panicked("parent machinery".to_string()))
        );
    }

    #[tokio::test]
    async fn provider_panic_rejects_execution() {
        let continuation: Task<u8> = Task::from_result(1).then(|_| panic!("provider blew up"));
        let outcome = continuation.execute().await;
        assert_eq!(
            outcome.unwrap_err(),
            TaskError::Panicked("provider blew up".to_string())
        );
        assert_eq!(continuation.state(), TaskState::Faulted);
    }

    #[tokio::test]
    async fn parent_is_shared_between_continuations() {
        let parent = Task::from_result(2);
        let doubled = parent.then(|r| Task::from_result(r.into_value().unwrap_or(0) * 2));
        let tripled = parent.then(|r| Task::from_result(r.into_value().unwrap_or(0) * 3));

        assert_eq!(doubled.execute().await.unwrap().into_value(), Some(4));
        assert_eq!(tripled.execute().await.unwrap().into_value(), Some(6));
    }
}
