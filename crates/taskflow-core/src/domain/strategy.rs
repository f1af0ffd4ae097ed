//! Continuation strategy: which parent outcomes let a continuation proceed.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use super::state::TaskState;

/// Bit flags selecting the parent outcomes a continuation runs after.
///
/// `Discontinued` (and any non-terminal state) maps to no bit at all, so a
/// discontinued parent always blocks its continuation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskContinuationStrategy(u8);

impl TaskContinuationStrategy {
    pub const NONE: Self = Self(0);
    pub const ON_COMPLETION: Self = Self(1);
    pub const ON_ERROR: Self = Self(2);
    pub const ON_CANCELLATION: Self = Self(4);
    pub const ALL: Self = Self(7);

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Builds a strategy from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The permission bit a parent's terminal state requires.
    pub fn for_state(state: TaskState) -> Option<Self> {
        match state {
            TaskState::Completed => Some(Self::ON_COMPLETION),
            TaskState::Faulted => Some(Self::ON_ERROR),
            TaskState::Cancelled => Some(Self::ON_CANCELLATION),
            TaskState::Created | TaskState::Running | TaskState::Discontinued => None,
        }
    }

    /// Does this strategy let a continuation run after a parent in `state`?
    pub fn permits(self, state: TaskState) -> bool {
        Self::for_state(state).is_some_and(|bit| !(self & bit).is_empty())
    }
}

impl Default for TaskContinuationStrategy {
    fn default() -> Self {
        Self::ALL
    }
}

impl BitOr for TaskContinuationStrategy {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for TaskContinuationStrategy {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TaskContinuationStrategy {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for TaskContinuationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        if *self == Self::ALL {
            return f.write_str("ALL");
        }
        let names = [
            (Self::ON_COMPLETION, "ON_COMPLETION"),
            (Self::ON_ERROR, "ON_ERROR"),
            (Self::ON_CANCELLATION, "ON_CANCELLATION"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    type S = TaskContinuationStrategy;

    #[test]
    fn default_is_all() {
        assert_eq!(S::default(), S::ALL);
        assert_eq!(S::ON_COMPLETION | S::ON_ERROR | S::ON_CANCELLATION, S::ALL);
    }

    #[rstest]
    #[case::completed(TaskState::Completed, Some(S::ON_COMPLETION))]
    #[case::faulted(TaskState::Faulted, Some(S::ON_ERROR))]
    #[case::cancelled(TaskState::Cancelled, Some(S::ON_CANCELLATION))]
    #[case::discontinued(TaskState::Discontinued, None)]
    #[case::running(TaskState::Running, None)]
    #[case::created(TaskState::Created, None)]
    fn each_state_maps_to_one_bit(#[case] state: TaskState, #[case] bit: Option<S>) {
        assert_eq!(S::for_state(state), bit);
    }

    #[rstest]
    #[case(S::ALL, TaskState::Completed, true)]
    #[case(S::ALL, TaskState::Discontinued, false)]
    #[case(S::ON_ERROR, TaskState::Completed, false)]
    #[case(S::ON_ERROR, TaskState::Faulted, true)]
    #[case(S::ON_COMPLETION | S::ON_CANCELLATION, TaskState::Cancelled, true)]
    #[case(S::NONE, TaskState::Completed, false)]
    fn permits_checks_the_state_bit(
        #[case] strategy: S,
        #[case] state: TaskState,
        #[case] expected: bool,
    ) {
        assert_eq!(strategy.permits(state), expected);
    }

    #[test]
    fn unknown_bits_are_dropped() {
        assert_eq!(S::from_bits_truncate(0xff), S::ALL);
        assert_eq!(format!("{:?}", S::ON_COMPLETION | S::ON_ERROR), "ON_COMPLETION | ON_ERROR");
    }
}
