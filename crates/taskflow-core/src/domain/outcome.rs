//! Outcome model: the settled result of a task.

use super::errors::{CancellationError, DiscontinuationError, TaskError};
use super::state::TaskState;

/// The settled outcome of a task.
///
/// - `Completed`: `value` holds what the task produced (may be `()`).
/// - `Faulted` / `Cancelled` / `Discontinued`: `error` holds the failure
///   payload and `value` is absent.
///
/// Fields are private so the constructors keep exactly one of `value` /
/// `error` meaningful for the state.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult<T> {
    state: TaskState,
    value: Option<T>,
    error: Option<TaskError>,
}

impl<T> TaskResult<T> {
    pub fn completed(value: T) -> Self {
        Self {
            state: TaskState::Completed,
            value: Some(value),
            error: None,
        }
    }

    pub fn faulted(error: TaskError) -> Self {
        Self {
            state: TaskState::Faulted,
            value: None,
            error: Some(error),
        }
    }

    pub fn cancelled(error: CancellationError) -> Self {
        Self {
            state: TaskState::Cancelled,
            value: None,
            error: Some(TaskError::Cancelled(error)),
        }
    }

    pub fn discontinued(error: DiscontinuationError) -> Self {
        Self {
            state: TaskState::Discontinued,
            value: None,
            error: Some(TaskError::Discontinued(error)),
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Converts into a plain `Result`.
    pub fn into_result(self) -> Result<T, TaskError> {
        match (self.value, self.error) {
            (Some(value), _) => Ok(value),
            (None, Some(error)) => Err(error),
            (None, None) => Err(TaskError::Aborted(format!(
                "{} result carries neither value nor error",
                self.state
            ))),
        }
    }

    /// Re-types a result with the value dropped.
    ///
    /// Used to pass a non-completed outcome through unchanged to a node of
    /// another value type.
    pub fn without_value<U>(self) -> TaskResult<U> {
        TaskResult {
            state: self.state,
            value: None,
            error: self.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_holds_value_only() {
        let r = TaskResult::completed("foo");
        assert_eq!(r.state(), TaskState::Completed);
        assert_eq!(r.value(), Some(&"foo"));
        assert!(r.error().is_none());
        assert_eq!(r.into_result().unwrap(), "foo");
    }

    #[test]
    fn unit_value_is_still_a_value() {
        let r = TaskResult::completed(());
        assert!(r.is_completed());
        assert_eq!(r.into_value(), Some(()));
    }

    #[test]
    fn failures_hold_error_only() {
        let r = TaskResult::<u8>::faulted(TaskError::NoTasks);
        assert_eq!(r.state(), TaskState::Faulted);
        assert!(r.value().is_none());
        assert_eq!(r.into_result().unwrap_err(), TaskError::NoTasks);

        let r = TaskResult::<u8>::cancelled(CancellationError::with_reason("stop"));
        assert_eq!(r.state(), TaskState::Cancelled);
        assert!(r.error().is_some_and(TaskError::is_cancellation));
    }

    #[test]
    fn without_value_keeps_state_and_error() {
        let r = TaskResult::<u8>::cancelled(CancellationError::default());
        let retyped: TaskResult<String> = r.clone().without_value();
        assert_eq!(retyped.state(), TaskState::Cancelled);
        assert_eq!(retyped.error(), r.error());
    }
}
