//! # Task System Core Types
//!
//! A `Task` is a unit of work shipped to a worker thread. It carries the id of the
//! owner that published it and a `TaskKind`, so the owner can recognise its own
//! completions among everything the `TaskManager` hands back.
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The output (or the panic that interrupted it) is wrapped in a `CompletedTask`
//! 4. `TaskManager::process_completed_tasks()` returns it on the main thread, where the
//!    owner matches it by owner id and kind
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - Outputs must be `Send` to be transferred back to the main thread
//! - All shared state must be properly synchronized

use std::any::Any;

use crate::error::TaskError;

/// Identifies whoever published a task.
pub type OwnerId = u64;

/// Type-erased result of `Task::process`.
pub type TaskOutput = Box<dyn Any + Send>;

/// What a task does, as seen by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A world's background chunk-state pass.
    UpdateChunkState,
}

/// A unit of work that can be executed on a worker thread.
///
/// Tasks should own (or share through locks) all the data they need. They run to
/// completion; there is no cancellation.
pub trait Task: Send {
    /// Id of the publisher, echoed back in the `CompletedTask`.
    fn owner(&self) -> OwnerId;

    fn kind(&self) -> TaskKind;

    /// Performs the work. Runs on a worker thread.
    fn process(&self) -> TaskOutput;
}

/// A finished task, as returned to the main thread.
#[derive(Debug)]
pub struct CompletedTask {
    pub owner: OwnerId,
    pub kind: TaskKind,
    /// The task's output, or the reason it produced none.
    pub outcome: Result<TaskOutput, TaskError>,
}

impl CompletedTask {
    /// The output downcast to `T`, if the task succeeded and produced a `T`.
    pub fn output<T: 'static>(&self) -> Option<&T> {
        self.outcome.as_ref().ok()?.downcast_ref::<T>()
    }
}
