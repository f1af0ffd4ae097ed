//! Map node: transforms the value of a completed source task.

use std::panic::{self, AssertUnwindSafe};

use async_trait::async_trait;

use super::{Node, Settle, Task, TaskValue};
use crate::domain::{TaskError, TaskResult};

type Mapper<S, T> = Box<dyn FnOnce(S) -> T + Send>;

pub(crate) struct MapNode<S, T> {
    source: Task<S>,
    mapper: Mapper<S, T>,
}

impl<S, T> MapNode<S, T> {
    pub(crate) fn new<F>(source: Task<S>, mapper: F) -> Self
    where
        F: FnOnce(S) -> T + Send + 'static,
    {
        Self {
            source,
            mapper: Box::new(mapper),
        }
    }
}

#[async_trait]
impl<S: TaskValue, T: TaskValue> Node<T> for MapNode<S, T> {
    async fn evaluate(self: Box<Self>, settle: Settle<T>) -> TaskResult<T> {
        let Self { source, mapper } = *self;

        let result = match source.execute().await {
            Ok(result) => result,
            Err(error) => return settle.fault(error),
        };
        if !result.is_completed() {
            return settle.adopt(result.without_value());
        }

        let value = match result.into_result() {
            Ok(value) => value,
            Err(error) => return settle.fault(error),
        };
        // a panicking mapper faults this node instead of tearing down the
        // evaluation
        match panic::catch_unwind(AssertUnwindSafe(move || mapper(value))) {
            Ok(mapped) => settle.complete(mapped),
            Err(payload) => settle.fault(TaskError::from_panic(payload)),
        }
    }
}
