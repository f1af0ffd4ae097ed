//! Task state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a task node.
///
/// State transitions:
/// - Created -> Running -> Completed
/// - Created -> Running -> Faulted
/// - Created -> Running -> Cancelled
/// - Created -> Running -> Discontinued
///
/// The discriminants are ordered: every state after `Running` is terminal,
/// and a terminal state never changes again.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Built but `execute()` has not been called yet.
    Created = 0,

    /// Evaluation in progress.
    Running = 1,

    /// Produced a value.
    Completed = 2,

    /// Failed with an error (or the evaluation machinery itself failed).
    Faulted = 3,

    /// Stopped by a cancellation error.
    Cancelled = 4,

    /// A continuation whose strategy rejected the parent's outcome.
    Discontinued = 5,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_done(self) -> bool {
        self > TaskState::Running
    }

    pub(crate) fn as_u8(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            0 => TaskState::Created,
            1 => TaskState::Running,
            2 => TaskState::Completed,
            3 => TaskState::Faulted,
            4 => TaskState::Cancelled,
            _ => TaskState::Discontinued,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Created => "created",
            TaskState::Running => "running",
            TaskState::Completed => "completed",
            TaskState::Faulted => "faulted",
            TaskState::Cancelled => "cancelled",
            TaskState::Discontinued => "discontinued",
        };
        f.write_str(s)
    }
}
