//! Domain model: task states, outcomes, continuation strategy, errors, IDs.

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod state;
pub mod strategy;

pub use errors::{BoxError, CancellationError, DiscontinuationError, TaskError};
pub use ids::TaskId;
pub use outcome::TaskResult;
pub use state::TaskState;
pub use strategy::TaskContinuationStrategy;
