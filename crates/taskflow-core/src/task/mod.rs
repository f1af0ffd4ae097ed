//! Task core: the node state machine, the memoized execution, and the
//! combinator factories.
//!
//! A `Task<T>` is a cheap handle over one node of a composition graph. The
//! node kinds live in the submodules:
//! - **leaf**: wraps a caller-supplied async action
//! - **continuation**: runs a child after a parent, gated by a strategy
//! - **join**: waits for every sibling
//! - **race**: adopts the first sibling to settle
//! - **map**: transforms a completed value
//!
//! # Evaluation
//! The first `execute()` moves the node `Created -> Running` and spawns its
//! evaluation on the current tokio runtime, so the work makes progress
//! whether or not the returned future is polled. Every `execute()` returns a
//! clone of the same [`Execution`].
//!
//! An evaluation settles through exactly one `Settle` call, which records
//! the terminal state and produces the `TaskResult` the execution resolves
//! with. If the evaluation panics instead, the state is still recorded as
//! `Faulted` but the execution resolves to `Err(TaskError::Panicked)`.
//! Combinators fold such an `Err` from a child into their own `Faulted`
//! outcome.

mod continuation;
mod join;
mod leaf;
mod map;
mod race;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};

use crate::domain::{
    CancellationError, DiscontinuationError, TaskContinuationStrategy, TaskError, TaskId,
    TaskResult, TaskState,
};

use self::continuation::ContinuationNode;
use self::join::JoinNode;
use self::map::MapNode;
use self::race::RaceNode;

/// Bounds every task value satisfies.
///
/// `Clone` because one memoized result is shared by every observer;
/// `Send + Sync + 'static` because evaluations run as spawned tokio tasks.
pub trait TaskValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> TaskValue for T {}

/// What an [`Execution`] resolves to.
pub type Outcome<T> = Result<TaskResult<T>, TaskError>;

/// The memoized outcome future of a task.
///
/// Clones share one underlying future; [`Execution::ptr_eq`] tells whether
/// two executions are the same one.
pub struct Execution<T> {
    inner: Shared<BoxFuture<'static, Outcome<T>>>,
}

impl<T: TaskValue> Execution<T> {
    fn new(future: impl Future<Output = Outcome<T>> + Send + 'static) -> Self {
        Self {
            inner: future.boxed().shared(),
        }
    }

    fn settled(outcome: Outcome<T>) -> Self {
        Self::new(futures::future::ready(outcome))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Shared::ptr_eq(&self.inner, &other.inner)
    }

    /// The outcome, if some clone of this execution has already been
    /// polled to completion.
    pub fn peek(&self) -> Option<&Outcome<T>> {
        self.inner.peek()
    }
}

impl<T: TaskValue> Clone for Execution<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: TaskValue> Future for Execution<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

/// Node-specific evaluation logic.
#[async_trait]
pub(crate) trait Node<T>: Send {
    async fn evaluate(self: Box<Self>, settle: Settle<T>) -> TaskResult<T>;
}

/// Shared node state.
struct Inner<T> {
    id: TaskId,
    state: AtomicU8,

    /// Evaluation body, taken by the first `execute()`.
    node: Mutex<Option<Box<dyn Node<T>>>>,

    /// Created lazily by the first `execute()`.
    execution: OnceLock<Execution<T>>,

    /// Recorded before the terminal state is published.
    outcome: OnceLock<Outcome<T>>,
}

impl<T> Inner<T> {
    fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `to` unless the node is already in a terminal state.
    fn transition(&self, to: TaskState) -> bool {
        let updated = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                (!TaskState::from_u8(raw).is_done()).then_some(to.as_u8())
            });
        match updated {
            Ok(raw) => {
                tracing::trace!(
                    task = %self.id,
                    from = %TaskState::from_u8(raw),
                    %to,
                    "state transition"
                );
                true
            }
            Err(raw) => {
                tracing::debug!(
                    task = %self.id,
                    state = %TaskState::from_u8(raw),
                    attempted = %to,
                    "ignored transition out of a terminal state"
                );
                false
            }
        }
    }

    /// Record `outcome` and move to its terminal state. The first outcome
    /// wins.
    fn finish(&self, outcome: Outcome<T>) {
        let to = match &outcome {
            Ok(result) => result.state(),
            Err(_) => TaskState::Faulted,
        };
        if self.outcome.set(outcome).is_ok() {
            self.transition(to);
        }
    }
}

/// Settles one node. Every method consumes the handle, so an evaluation
/// settles at most once.
pub(crate) struct Settle<T> {
    inner: Arc<Inner<T>>,
}

impl<T: Clone> Settle<T> {
    pub(crate) fn id(&self) -> TaskId {
        self.inner.id
    }

    pub(crate) fn complete(self, value: T) -> TaskResult<T> {
        self.adopt(TaskResult::completed(value))
    }

    pub(crate) fn fault(self, error: TaskError) -> TaskResult<T> {
        self.adopt(TaskResult::faulted(error))
    }

    pub(crate) fn cancel(self, error: CancellationError) -> TaskResult<T> {
        self.adopt(TaskResult::cancelled(error))
    }

    pub(crate) fn discontinue(self, error: DiscontinuationError) -> TaskResult<T> {
        self.adopt(TaskResult::discontinued(error))
    }

    /// Mirror a child's state, value and error onto this node.
    pub(crate) fn adopt(self, result: TaskResult<T>) -> TaskResult<T> {
        self.inner.finish(Ok(result.clone()));
        result
    }
}

/// A node in a task composition graph.
///
/// Cloning a `Task` clones the handle, not the work: all clones share one
/// state and one execution, and the same task may feed any number of
/// combinators.
pub struct Task<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.inner.id)
            .field("state", &self.inner.state())
            .finish()
    }
}

impl<T: TaskValue> Task<T> {
    pub(crate) fn from_node(node: impl Node<T> + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: TaskId::generate(),
                state: AtomicU8::new(TaskState::Created.as_u8()),
                node: Mutex::new(Some(Box::new(node))),
                execution: OnceLock::new(),
                outcome: OnceLock::new(),
            }),
        }
    }

    /// A task that is already executed and settled with `result`.
    pub(crate) fn settled(result: TaskResult<T>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: TaskId::generate(),
                state: AtomicU8::new(result.state().as_u8()),
                node: Mutex::new(None),
                execution: OnceLock::from(Execution::settled(Ok(result.clone()))),
                outcome: OnceLock::from(Ok(result)),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.inner.id
    }

    pub fn state(&self) -> TaskState {
        self.inner.state()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_done()
    }

    /// The settled outcome. Always `Some` once [`Task::is_done`] is true.
    pub fn outcome(&self) -> Option<&Outcome<T>> {
        self.inner.outcome.get()
    }

    /// Start the task (first call only) and return its memoized execution.
    ///
    /// The evaluation is spawned on the current tokio runtime. Outside a
    /// runtime nothing is started: the task stays `Created` and the returned
    /// execution resolves to `Err(TaskError::Aborted)` without being
    /// memoized, so a later call from within a runtime runs it normally.
    pub fn execute(&self) -> Execution<T> {
        if let Some(execution) = self.inner.execution.get() {
            return execution.clone();
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(task = %self.inner.id, "execute called outside a tokio runtime");
            return Execution::settled(Err(TaskError::Aborted(format!(
                "{} executed outside a tokio runtime",
                self.inner.id
            ))));
        };
        self.inner
            .execution
            .get_or_init(|| self.start(&runtime))
            .clone()
    }

    fn start(&self, runtime: &tokio::runtime::Handle) -> Execution<T> {
        let node = self
            .inner
            .node
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(node) = node else {
            let error = TaskError::Aborted(format!("{} has no evaluation body", self.inner.id));
            self.inner.finish(Err(error.clone()));
            return Execution::settled(Err(error));
        };

        self.inner.transition(TaskState::Running);
        let settle = Settle {
            inner: Arc::clone(&self.inner),
        };
        // weak: the execution is stored inside `Inner`
        let weak = Arc::downgrade(&self.inner);
        let watcher = weak.clone();

        let handle = runtime.spawn(async move {
            match AssertUnwindSafe(node.evaluate(settle)).catch_unwind().await {
                Ok(result) => Ok(result),
                Err(payload) => {
                    let error = TaskError::from_panic(payload);
                    if let Some(inner) = weak.upgrade() {
                        tracing::debug!(task = %inner.id, %error, "evaluation panicked");
                        inner.finish(Err(error.clone()));
                    }
                    Err(error)
                }
            }
        });

        Execution::new(async move {
            handle.await.unwrap_or_else(|join_error| {
                let error = TaskError::from(join_error);
                if let Some(inner) = watcher.upgrade() {
                    inner.finish(Err(error.clone()));
                }
                Err(error)
            })
        })
    }

    /// Run the task produced by `child_provider` once this task settles, for
    /// any settled outcome except `Discontinued`.
    pub fn then<U, F>(&self, child_provider: F) -> Task<U>
    where
        U: TaskValue,
        F: FnOnce(TaskResult<T>) -> Task<U> + Send + 'static,
    {
        self.then_with(child_provider, TaskContinuationStrategy::ALL)
    }

    /// Like [`Task::then`], but only for the parent outcomes `strategy`
    /// allows; the continuation is `Discontinued` otherwise.
    pub fn then_with<U, F>(&self, child_provider: F, strategy: TaskContinuationStrategy) -> Task<U>
    where
        U: TaskValue,
        F: FnOnce(TaskResult<T>) -> Task<U> + Send + 'static,
    {
        Task::from_node(ContinuationNode::new(self.clone(), child_provider, strategy))
    }

    /// Wait for this task and `siblings`; results keep input order.
    pub fn join<I>(&self, siblings: I) -> Task<Vec<TaskResult<T>>>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        Task::all(std::iter::once(self.clone()).chain(siblings))
    }

    /// Adopt the outcome of whichever of this task and `siblings` settles
    /// first.
    pub fn race<I>(&self, siblings: I) -> Task<T>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        Task::any(std::iter::once(self.clone()).chain(siblings))
    }

    /// Transform the value of a completed task; other outcomes pass through.
    pub fn map<U, F>(&self, mapper: F) -> Task<U>
    where
        U: TaskValue,
        F: FnOnce(T) -> U + Send + 'static,
    {
        Task::from_node(MapNode::new(self.clone(), mapper))
    }

    /// Race this task against a delay: `Some(value)` if it completes first,
    /// `None` if the delay wins. The task itself keeps running after a
    /// timeout.
    pub fn timeout(&self, duration: Duration) -> Task<Option<T>> {
        let deadline = Task::<()>::delay(duration).map(|()| None::<T>);
        self.map(Some).race([deadline])
    }

    /// Join node over `tasks`.
    pub fn all<I>(tasks: I) -> Task<Vec<TaskResult<T>>>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        Task::from_node(JoinNode::new(tasks.into_iter().collect()))
    }

    /// Race node over `tasks`.
    pub fn any<I>(tasks: I) -> Task<T>
    where
        I: IntoIterator<Item = Task<T>>,
    {
        Task::from_node(RaceNode::new(tasks.into_iter().collect()))
    }
}
