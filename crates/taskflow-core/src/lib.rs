//! taskflow-core
//!
//! Composable, cancellable units of async work.
//!
//! # Modules
//! - **domain**: task states, outcomes, continuation strategy, errors, IDs
//! - **task**: `Task<T>` and its node kinds (leaf, continuation, join, race, map)
//! - **cancellation**: cooperative `CancellationToken`
//! - **report**: serializable status views
//!
//! ```ignore
//! let fetch = Task::new(|| async { Ok::<_, BoxError>(40) });
//! let answer = fetch.map(|x| x + 2).timeout(Duration::from_secs(1));
//! let result = answer.execute().await?;
//! ```

pub mod cancellation;
pub mod domain;
pub mod report;
pub mod task;

pub use cancellation::CancellationToken;
pub use domain::{
    BoxError, CancellationError, DiscontinuationError, TaskContinuationStrategy, TaskError,
    TaskId, TaskResult, TaskState,
};
pub use report::TaskReport;
pub use task::{Execution, Outcome, Task, TaskValue};
