//! Status views: serializable snapshots of tasks and their outcomes.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::domain::{TaskId, TaskResult, TaskState};
use crate::task::{Task, TaskValue};

/// Serialized as `{ "state": ..., "value": ..., "error": "..." }`; `value`
/// and `error` are omitted when absent and the error is rendered with its
/// `Display` text.
impl<T: Serialize> Serialize for TaskResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = 1 + usize::from(self.value().is_some()) + usize::from(self.error().is_some());
        let mut s = serializer.serialize_struct("TaskResult", len)?;
        s.serialize_field("state", &self.state())?;
        if let Some(value) = self.value() {
            s.serialize_field("value", value)?;
        }
        if let Some(error) = self.error() {
            s.serialize_field("error", &error.to_string())?;
        }
        s.end()
    }
}

/// Snapshot of one task for logs and API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub id: TaskId,
    pub state: TaskState,
    pub done: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskReport {
    /// Report on `task` as of now.
    ///
    /// `value` / `error` are filled in once the task is done.
    pub fn of<T>(task: &Task<T>) -> Result<Self, serde_json::Error>
    where
        T: TaskValue + Serialize,
    {
        // the outcome is recorded before the state, so read the state first
        let state = task.state();
        let mut report = Self {
            id: task.id(),
            state,
            done: state.is_done(),
            value: None,
            error: None,
        };
        if !report.done {
            return Ok(report);
        }

        match task.outcome() {
            Some(Ok(result)) => {
                report.value = result.value().map(serde_json::to_value).transpose()?;
                report.error = result.error().map(ToString::to_string);
            }
            Some(Err(error)) => report.error = Some(error.to_string()),
            None => {}
        }
        Ok(report)
    }
}
