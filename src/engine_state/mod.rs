//! # Engine State Module
//!
//! The core engine module that owns the background workers and the streamed worlds.
//!
//! ## Key Components
//!
//! * `EngineState` - The main state container for the engine
//! * `commands` - The console command table
//! * `task_management` - Manages asynchronous tasks and worker threads
//! * `voxels` - Handles voxel data, chunks, and world streaming
//!
//! ## Tick
//!
//! `EngineState::tick` is the whole main loop body: completed tasks are routed to the
//! world that published them, every world runs its `update`, and queued tasks are
//! handed to workers that became free.

use log::{error, info, warn};
use web_time::Instant;

use crate::{
    config::{EngineConfig, WorldConfig},
    error::{CommandError, EngineError},
};

use commands::ConsoleCommand;
use task_management::TaskManager;
use voxels::world::World;

pub mod commands;
pub mod task_management;
pub mod voxels;

/// The main state container for the engine.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use cgmath::Point3;
/// use voxel_streaming::{
///     config::EngineConfig,
///     engine_state::{voxels::observer::TrackedPosition, EngineState},
/// };
///
/// let mut engine = EngineState::new(EngineConfig::default())?;
/// let player = Arc::new(TrackedPosition::new(Point3::new(0.0, 40.0, 0.0)));
/// engine.active_world_mut().add_observer(&player);
///
/// loop {
///     engine.tick(web_time::Instant::now());
/// #   break;
/// }
/// # Ok::<(), voxel_streaming::error::EngineError>(())
/// ```
pub struct EngineState {
    /// Task manager for asynchronous operations
    pub task_manager: TaskManager,
    worlds: Vec<World>,
    active_world: usize,
}

impl EngineState {
    /// Spawns the workers and creates the first world from `config.world`.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let task_manager = TaskManager::new(config.worker_threads)?;
        info!("Engine started with {} worker(s)", task_manager.worker_count());

        Ok(EngineState {
            task_manager,
            worlds: vec![World::new(config.world)],
            active_world: 0,
        })
    }

    /// Adds another world and returns its index.
    pub fn create_world(&mut self, config: WorldConfig) -> usize {
        self.worlds.push(World::new(config));
        self.worlds.len() - 1
    }

    pub fn worlds(&self) -> &[World] {
        &self.worlds
    }

    pub fn world(&self, index: usize) -> Option<&World> {
        self.worlds.get(index)
    }

    pub fn world_mut(&mut self, index: usize) -> Option<&mut World> {
        self.worlds.get_mut(index)
    }

    /// The world console commands apply to.
    pub fn active_world(&self) -> &World {
        &self.worlds[self.active_world]
    }

    pub fn active_world_mut(&mut self) -> &mut World {
        &mut self.worlds[self.active_world]
    }

    /// Makes the world at `index` the target of console commands.
    pub fn set_active_world(&mut self, index: usize) -> bool {
        if index >= self.worlds.len() {
            return false;
        }
        self.active_world = index;
        true
    }

    /// Runs one iteration of the main loop. Returns the number of chunks handed to the
    /// renderer across all worlds.
    pub fn tick(&mut self, now: Instant) -> usize {
        for completed in self.task_manager.process_completed_tasks() {
            let handled = self
                .worlds
                .iter_mut()
                .any(|world| world.handle_task_completed(&completed));
            if !handled {
                warn!("Dropping completed task of unknown owner {}", completed.owner);
            }
        }

        let mut rendered = 0;
        for world in &mut self.worlds {
            rendered += world.update(&mut self.task_manager, now);
        }

        self.task_manager.process_queued_tasks();
        rendered
    }

    /// Parses and applies a console command to the active world.
    ///
    /// Failures are logged and returned; the world is left as it was.
    pub fn execute_command(&mut self, line: &str) -> Result<(), CommandError> {
        let result = ConsoleCommand::parse(line).and_then(|command| command.apply(self.active_world_mut()));
        if let Err(error) = &result {
            error!("Command '{}' failed: {}", line.trim(), error);
        }
        result
    }
}
