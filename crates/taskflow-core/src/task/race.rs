//! Race node: adopts the outcome of the first sibling to settle.

use async_trait::async_trait;

use super::{Node, Settle, Task, TaskValue};
use crate::domain::{TaskError, TaskResult};

pub(crate) struct RaceNode<T> {
    tasks: Vec<Task<T>>,
}

impl<T> RaceNode<T> {
    pub(crate) fn new(tasks: Vec<Task<T>>) -> Self {
        Self { tasks }
    }
}

/// Losing siblings are not cancelled: their evaluations keep running on the
/// runtime and their outcomes are simply never looked at by the race.
#[async_trait]
impl<T: TaskValue> Node<T> for RaceNode<T> {
    async fn evaluate(self: Box<Self>, settle: Settle<T>) -> TaskResult<T> {
        let Self { tasks } = *self;
        if tasks.is_empty() {
            return settle.fault(TaskError::NoTasks);
        }

        let executions: Vec<_> = tasks.iter().map(Task::execute).collect();
        let (outcome, winner, losers) = futures::future::select_all(executions).await;
        tracing::debug!(
            task = %settle.id(),
            winner = %tasks[winner].id(),
            detached = losers.len(),
            "race settled"
        );

        match outcome {
            Ok(result) => settle.adopt(result),
            Err(error) => settle.fault(error),
        }
    }
}
