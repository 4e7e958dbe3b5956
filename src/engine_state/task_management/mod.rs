//! # Task Management System
//!
//! This module provides the worker pool that executes background work away from the
//! thread driving the tick loop.
//!
//! ## Architecture Overview
//!
//! The task management system consists of several key components:
//! - `TaskManager`: Central coordinator for task distribution and worker management
//! - `Task`: A unit of work that can be executed asynchronously
//! - `CompletedTask`: The outcome of a task, tagged with its owner and kind
//! - `TaskChannel`: Communication channel between the main thread and one worker thread
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to available worker channels using round-robin,
//!    queueing them when every worker is busy
//! 3. Workers process tasks and send back a `CompletedTask`. A panicking task is caught
//!    and reported as `TaskError::Panicked`; the worker keeps running
//! 4. `process_completed_tasks()` collects the results on the main thread without
//!    blocking, and `process_queued_tasks()` feeds freed workers from the queue
//!
//! ## Example Usage
//! ```rust,no_run
//! use voxel_streaming::engine_state::task_management::TaskManager;
//!
//! let mut task_manager = TaskManager::new(2)?;
//!
//! // In your main loop:
//! for completed in task_manager.process_completed_tasks() {
//!     // route `completed` to its owner
//! #   let _ = completed;
//! }
//! task_manager.process_queued_tasks();
//! # Ok::<(), voxel_streaming::error::EngineError>(())
//! ```

pub mod task;

use std::{
    any::Any,
    collections::VecDeque,
    panic::{self, AssertUnwindSafe},
    sync::mpsc::{channel, Receiver, Sender},
    thread::{self, JoinHandle},
};

use log::{debug, info, warn};

use crate::error::{EngineError, TaskError};

use task::{CompletedTask, Task};

/// A communication channel between the main thread and a worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks from main thread to worker
/// - `result_receiver`: Receives completed tasks from worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined when the manager is dropped
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Sender<Box<dyn Task>>,
    result_receiver: Receiver<CompletedTask>,
    num_tasks_in_flight: usize,
    worker: JoinHandle<()>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// The `TaskManager` is responsible for:
/// - Creating and managing worker threads
/// - Distributing tasks across available workers
/// - Collecting task results
/// - Handling task queuing when all workers are busy
///
/// Dropping the manager closes every task channel and joins the workers, waiting for
/// tasks already running to finish.
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
///
/// This is set to 1 to ensure tasks are processed in order within each channel.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn run_worker(task_receiver: Receiver<Box<dyn Task>>, result_sender: Sender<CompletedTask>) {
    while let Ok(task) = task_receiver.recv() {
        let owner = task.owner();
        let kind = task.kind();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.process())).map_err(|payload| {
            TaskError::Panicked {
                message: panic_message(payload.as_ref()),
            }
        });

        if result_sender.send(CompletedTask { owner, kind, outcome }).is_err() {
            break;
        }
    }
}

impl TaskManager {
    /// Creates a new `TaskManager` with `num_workers` worker threads.
    ///
    /// With zero workers every published task stays queued.
    pub fn new(num_workers: usize) -> Result<Self, EngineError> {
        info!(
            "Available parallelism: {:?}, spawning {} worker(s)",
            thread::available_parallelism(),
            num_workers
        );

        let mut channels = Vec::with_capacity(num_workers);
        for index in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task>>();
            let (result_tx, result_rx) = channel::<CompletedTask>();

            let worker = thread::Builder::new()
                .name(format!("voxel-worker-{index}"))
                .spawn(move || run_worker(task_rx, result_tx))
                .map_err(EngineError::WorkerSpawn)?;

            channels.push(TaskChannel {
                task_sender: task_tx,
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                worker,
            });
        }

        Ok(TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        })
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// Returns the task back if the worker has disconnected, so it can be requeued.
    fn try_send_task(&mut self, task: Box<dyn Task>, channel_idx: usize) -> Result<(), Box<dyn Task>> {
        match self.channels[channel_idx].task_sender.send(task) {
            Ok(_) => {
                self.channels[channel_idx].num_tasks_in_flight += 1;
                Ok(())
            }
            Err(error) => Err(error.0),
        }
    }

    /// Finds an available worker channel, round-robin from the last used one.
    ///
    /// Channels that have reached `MAX_TASKS_IN_FLIGHT` are skipped.
    fn find_available_channel(&self) -> Option<usize> {
        if self.channels.is_empty() {
            return None;
        }

        let start_channel = self.current_channel;
        let mut current = start_channel;

        loop {
            if self.channels[current].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT {
                return Some(current);
            }
            current = (current + 1) % self.channels.len();
            if current == start_channel {
                return None;
            }
        }
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on an available worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(_) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    warn!("Worker {} disconnected, queueing task", channel_idx);
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                debug!("All workers busy, queueing {:?} task", task.kind());
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Schedules queued tasks on workers that became available, oldest first.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(_) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    // Channel is disconnected, put task back and stop processing
                    self.queued_tasks.push_front(task);
                    break;
                }
            }
        }
    }

    /// Collects every task that finished since the last call. Never blocks.
    pub fn process_completed_tasks(&mut self) -> Vec<CompletedTask> {
        let mut completed = Vec::new();
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                completed.push(result);
            }
        }
        completed
    }

    /// Number of worker threads.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of tasks waiting for a free worker.
    pub fn queued_task_count(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Number of tasks currently running or sent to a worker.
    pub fn tasks_in_flight(&self) -> usize {
        self.channels.iter().map(|channel| channel.num_tasks_in_flight).sum()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for channel in self.channels.drain(..) {
            let TaskChannel {
                task_sender, worker, ..
            } = channel;
            drop(task_sender);
            if worker.join().is_err() {
                warn!("Worker thread exited with a panic");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::{Duration, Instant};

    use super::{
        task::{OwnerId, TaskKind, TaskOutput},
        *,
    };

    /// Polls `task_manager` until `count` tasks completed or a few seconds passed.
    pub(crate) fn wait_for_completions(task_manager: &mut TaskManager, count: usize) -> Vec<CompletedTask> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut completed = Vec::new();
        while completed.len() < count && Instant::now() < deadline {
            completed.extend(task_manager.process_completed_tasks());
            task_manager.process_queued_tasks();
            thread::sleep(Duration::from_millis(1));
        }
        completed
    }

    struct ValueTask {
        owner: OwnerId,
        value: u32,
    }

    impl Task for ValueTask {
        fn owner(&self) -> OwnerId {
            self.owner
        }

        fn kind(&self) -> TaskKind {
            TaskKind::UpdateChunkState
        }

        fn process(&self) -> TaskOutput {
            Box::new(self.value * 2)
        }
    }

    struct PanickingTask;

    impl Task for PanickingTask {
        fn owner(&self) -> OwnerId {
            99
        }

        fn kind(&self) -> TaskKind {
            TaskKind::UpdateChunkState
        }

        fn process(&self) -> TaskOutput {
            panic!("pass blew up");
        }
    }

    #[test]
    fn completed_tasks_carry_owner_and_output() {
        let mut task_manager = TaskManager::new(1).unwrap();
        assert!(task_manager.publish_task(Box::new(ValueTask { owner: 7, value: 21 })));

        let completed = wait_for_completions(&mut task_manager, 1);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].owner, 7);
        assert_eq!(completed[0].kind, TaskKind::UpdateChunkState);
        assert_eq!(completed[0].output::<u32>(), Some(&42));
        assert_eq!(task_manager.tasks_in_flight(), 0);
    }

    #[test]
    fn busy_workers_queue_tasks_in_order() {
        let mut task_manager = TaskManager::new(1).unwrap();
        assert!(task_manager.publish_task(Box::new(ValueTask { owner: 1, value: 1 })));
        assert!(!task_manager.publish_task(Box::new(ValueTask { owner: 2, value: 2 })));
        assert!(!task_manager.publish_task(Box::new(ValueTask { owner: 3, value: 3 })));
        assert_eq!(task_manager.queued_task_count(), 2);

        let completed = wait_for_completions(&mut task_manager, 3);
        let owners: Vec<OwnerId> = completed.iter().map(|task| task.owner).collect();
        assert_eq!(owners, vec![1, 2, 3]);
        assert_eq!(task_manager.queued_task_count(), 0);
    }

    #[test]
    fn panicking_task_is_reported_and_worker_survives() {
        let mut task_manager = TaskManager::new(1).unwrap();
        task_manager.publish_task(Box::new(PanickingTask));

        let completed = wait_for_completions(&mut task_manager, 1);
        assert_eq!(completed.len(), 1);
        match &completed[0].outcome {
            Err(TaskError::Panicked { message }) => assert_eq!(message, "pass blew up"),
            other => panic!("unexpected outcome {other:?}"),
        }

        assert!(task_manager.publish_task(Box::new(ValueTask { owner: 5, value: 5 })));
        let completed = wait_for_completions(&mut task_manager, 1);
        assert_eq!(completed[0].output::<u32>(), Some(&10));
    }

    #[test]
    fn without_workers_tasks_stay_queued() {
        let mut task_manager = TaskManager::new(0).unwrap();
        assert!(!task_manager.publish_task(Box::new(ValueTask { owner: 1, value: 1 })));
        task_manager.process_queued_tasks();
        assert_eq!(task_manager.queued_task_count(), 1);
        assert!(task_manager.process_completed_tasks().is_empty());
    }
}
