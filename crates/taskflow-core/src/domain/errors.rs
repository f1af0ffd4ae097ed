//! Error types: why a task did not complete.
//!
//! - `TaskError::Failed`: the wrapped action's own error (logical failure)
//! - `TaskError::Cancelled`: the action stopped on a `CancellationError`
//! - `TaskError::Discontinued`: a continuation's strategy rejected its parent
//! - `TaskError::Aggregate` / `Panicked` / `Aborted`: the evaluation machinery
//!   of a node (or of its children) failed rather than the action itself

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::outcome::TaskResult;
use super::state::TaskState;

/// Error type returned by leaf actions.
///
/// Boxed so an action can `?` any error; the leaf task downcasts it to tell a
/// cancellation apart from a failure.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Raised by cooperative code that observed a cancellation request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancellationError {
    reason: Option<String>,
}

impl CancellationError {
    pub fn new(reason: Option<String>) -> Self {
        Self { reason }
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self::new(Some(reason.into()))
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }
}

impl fmt::Display for CancellationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "task was cancelled: {reason}"),
            None => f.write_str("task was cancelled"),
        }
    }
}

impl StdError for CancellationError {}

/// A continuation was not run because its parent's outcome did not satisfy
/// the continuation strategy.
///
/// Carries the parent's full result. The parent's value type is erased; get
/// it back with [`DiscontinuationError::parent_result`].
#[derive(Clone)]
pub struct DiscontinuationError {
    parent_state: TaskState,
    parent_error: Option<Box<TaskError>>,
    parent_result: Arc<dyn Any + Send + Sync>,
}

impl DiscontinuationError {
    pub fn new<P: Send + Sync + 'static>(parent_result: TaskResult<P>) -> Self {
        Self {
            parent_state: parent_result.state(),
            parent_error: parent_result.error().cloned().map(Box::new),
            parent_result: Arc::new(parent_result),
        }
    }

    pub fn parent_state(&self) -> TaskState {
        self.parent_state
    }

    pub fn parent_error(&self) -> Option<&TaskError> {
        self.parent_error.as_deref()
    }

    /// The parent's result, if `P` is the parent's value type.
    pub fn parent_result<P: 'static>(&self) -> Option<&TaskResult<P>> {
        self.parent_result.downcast_ref()
    }

    fn same_parent(&self, other: &Self) -> bool {
        std::ptr::addr_eq(
            Arc::as_ptr(&self.parent_result),
            Arc::as_ptr(&other.parent_result),
        )
    }
}

impl fmt::Debug for DiscontinuationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscontinuationError")
            .field("parent_state", &self.parent_state)
            .field("parent_error", &self.parent_error)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DiscontinuationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "continuation discontinued: parent task ended {}",
            self.parent_state
        )
    }
}

impl StdError for DiscontinuationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.parent_error
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// TaskError is the failure payload of a task outcome.
///
/// `Clone` because one memoized outcome is handed to every caller of
/// `execute()`.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("{0}")]
    Failed(Arc<dyn StdError + Send + Sync + 'static>),

    #[error(transparent)]
    Cancelled(#[from] CancellationError),

    #[error(transparent)]
    Discontinued(#[from] DiscontinuationError),

    /// Evaluation failures of joined tasks, in arrival order.
    #[error("{} task(s) failed during evaluation", .0.len())]
    Aggregate(Vec<TaskError>),

    #[error("at least one task is required")]
    NoTasks,

    #[error("task evaluation panicked: {0}")]
    Panicked(String),

    #[error("task evaluation aborted: {0}")]
    Aborted(String),
}

impl TaskError {
    /// Wrap an arbitrary error as a logical failure.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        TaskError::Failed(Arc::from(error.into()))
    }

    /// Classify an error returned by a leaf action.
    ///
    /// A `CancellationError` (or a `TaskError` that already is one) becomes
    /// `Cancelled`; a `TaskError` is kept as is; anything else is `Failed`.
    pub fn from_action(error: BoxError) -> Self {
        let error = match error.downcast::<CancellationError>() {
            Ok(cancelled) => return TaskError::Cancelled(*cancelled),
            Err(other) => other,
        };
        match error.downcast::<TaskError>() {
            Ok(task_error) => *task_error,
            Err(other) => TaskError::Failed(Arc::from(other)),
        }
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskError::Panicked(message)
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Cancelled(_))
    }

    pub fn as_cancellation(&self) -> Option<&CancellationError> {
        match self {
            TaskError::Cancelled(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_discontinuation(&self) -> Option<&DiscontinuationError> {
        match self {
            TaskError::Discontinued(d) => Some(d),
            _ => None,
        }
    }
}

impl From<tokio::task::JoinError> for TaskError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            TaskError::from_panic(err.into_panic())
        } else {
            TaskError::Aborted(err.to_string())
        }
    }
}

/// Raw errors compare by identity, everything else structurally.
impl PartialEq for TaskError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TaskError::Failed(a), TaskError::Failed(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            (TaskError::Cancelled(a), TaskError::Cancelled(b)) => a == b,
            (TaskError::Discontinued(a), TaskError::Discontinued(b)) => a.same_parent(b),
            (TaskError::Aggregate(a), TaskError::Aggregate(b)) => a == b,
            (TaskError::NoTasks, TaskError::NoTasks) => true,
            (TaskError::Panicked(a), TaskError::Panicked(b)) => a == b,
            (TaskError::Aborted(a), TaskError::Aborted(b)) => a == b,
            _ => false,
        }
    }
}
