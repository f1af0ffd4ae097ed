//! Join node: runs a fixed set of sibling tasks concurrently and waits for
//! all of them.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::FuturesUnordered;

use super::{Node, Settle, Task, TaskValue};
use crate::domain::{TaskError, TaskResult};

pub(crate) struct JoinNode<T> {
    tasks: Vec<Task<T>>,
}

impl<T> JoinNode<T> {
    pub(crate) fn new(tasks: Vec<Task<T>>) -> Self {
        Self { tasks }
    }
}

/// Settles `Completed` with the siblings' results in input order, whatever
/// their own states are. Only siblings whose execution itself failed (a
/// panicking evaluation) fault the join; their errors are collected in
/// arrival order.
#[async_trait]
impl<T: TaskValue> Node<Vec<TaskResult<T>>> for JoinNode<T> {
    async fn evaluate(
        self: Box<Self>,
        settle: Settle<Vec<TaskResult<T>>>,
    ) -> TaskResult<Vec<TaskResult<T>>> {
        let Self { tasks } = *self;
        if tasks.is_empty() {
            return settle.complete(Vec::new());
        }

        let mut pending: FuturesUnordered<_> = tasks
            .iter()
            .map(Task::execute)
            .enumerate()
            .map(|(index, execution)| async move { (index, execution.await) })
            .collect();

        let mut slots: Vec<Option<TaskResult<T>>> = vec![None; tasks.len()];
        let mut errors = Vec::new();
        while let Some((index, outcome)) = pending.next().await {
            match outcome {
                Ok(result) => slots[index] = Some(result),
                Err(error) => errors.push(error),
            }
        }

        if !errors.is_empty() {
            tracing::debug!(task = %settle.id(), failed = errors.len(), "join siblings failed");
            return settle.fault(TaskError::Aggregate(errors));
        }
        settle.complete(slots.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::domain::{BoxError, TaskError, TaskState};
    use crate::task::Task;

    fn after(ms: u64, value: &'static str) -> Task<&'static str> {
        Task::delay(Duration::from_millis(ms)).map(move |()| value)
    }

    async fn explode_after(ms: u64, message: &'static str) -> Result<&'static str, BoxError> {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        panic!("{message}")
    }

    fn exploding(ms: u64, message: &'static str) -> Task<&'static str> {
        Task::new(move || explode_after(ms, message))
    }

    #[tokio::test(start_paused = true)]
    async fn results_follow_input_order() {
        let a = after(100, "foo");
        let b = Task::from_result("bar");
        let c = after(200, "foobar");

        let start = Instant::now();
        let joined = Task::all([a.clone(), b.clone(), c.clone()]);
        let result = joined.execute().await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(result.state(), TaskState::Completed);
        let expected = vec![
            a.execute().await.unwrap(),
            b.execute().await.unwrap(),
            c.execute().await.unwrap(),
        ];
        assert_eq!(result.into_value(), Some(expected));
    }

    #[tokio::test]
    async fn empty_join_completes_immediately() {
        let result = Task::<u8>::all([]).execute().await.unwrap();
        assert_eq!(result.state(), TaskState::Completed);
        assert_eq!(result.into_value(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn failed_siblings_do_not_fault_the_join() {
        let joined = Task::from_result(1).join([
            Task::from_cancelled(None),
            Task::from_result(3),
            Task::from_result(0).then_with(
                |_| Task::from_result(4),
                crate::TaskContinuationStrategy::ON_ERROR,
            ),
        ]);

        let result = joined.execute().await.unwrap();
        assert_eq!(joined.state(), TaskState::Completed);
        let states: Vec<_> = result.into_value().unwrap().iter().map(|r| r.state()).collect();
        assert_eq!(
            states,
            vec![
                TaskState::Completed,
                TaskState::Cancelled,
                TaskState::Completed,
                TaskState::Discontinued,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_siblings_fault_with_their_errors() {
        let joined = Task::all([
            after(10, "slow"),
            exploding(30, "late"),
            Task::from_result("fine"),
            exploding(5, "early"),
        ]);

        let result = joined.execute().await.unwrap();
        assert_eq!(joined.state(), TaskState::Faulted);

        let Some(TaskError::Aggregate(errors)) = result.error() else {
            panic!("expected aggregate error, got {result:?}");
        };
        // arrival order, not input order
        assert_eq!(
            errors,
            &vec![
                TaskError::Panicked("early".to_string()),
                TaskError::Panicked("late".to_string()),
            ]
        );
    }
}
