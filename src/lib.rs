#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Streaming
//!
//! A chunked voxel world that streams itself around moving observers.
//!
//! The crate decides which chunks must exist around every observer, generates their
//! blocks and derives their geometry on worker threads, evicts chunks that fall out of
//! range, and hands fresh geometry to a renderer a few chunks per tick, all without the
//! tick loop ever waiting on a worker.
//!
//! ## Key Modules
//!
//! * `config` - JSON engine and world settings
//! * `core` - The lock shared between the tick loop and the workers
//! * `engine_state` - Worlds, chunks, task management and console commands
//! * `error` - Error types
//!
//! ## Usage
//!
//! ```no_run
//! fn main() -> Result<(), voxel_streaming::error::EngineError> {
//!     voxel_streaming::init_logging();
//!     voxel_streaming::run(voxel_streaming::config::EngineConfig::default())
//! }
//! ```

use std::{sync::Arc, thread, time::Duration};

use cgmath::Point3;
use log::info;
use web_time::Instant;

use config::EngineConfig;
use engine_state::{
    voxels::{events::WorldEvent, observer::TrackedPosition},
    EngineState,
};
use error::EngineError;

pub mod config;
pub mod core;
pub mod engine_state;
pub mod error;

/// Number of ticks the headless fly-over runs for.
pub const DEMO_TICKS: u32 = 600;
/// Observer speed of the fly-over, in blocks per tick.
const DEMO_SPEED: f32 = 0.5;
const TICK_DURATION: Duration = Duration::from_millis(16);

/// Initialises `env_logger`, writing to stdout and filtered by `RUST_LOG`.
///
/// Calling it more than once is harmless.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    if log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init()
        .is_ok()
    {
        info!("Logger initialized");
    }
}

/// Flies a single observer across the active world for `DEMO_TICKS` ticks and reports
/// what was streamed.
pub fn run(config: EngineConfig) -> Result<(), EngineError> {
    let mut engine = EngineState::new(config)?;
    let player = Arc::new(TrackedPosition::new(Point3::new(0.0, 24.0, 0.0)));
    engine.active_world_mut().add_observer(&player);
    let events = engine.active_world().subscribe();

    let (mut loaded, mut meshes, mut removed) = (0usize, 0usize, 0usize);
    for tick in 0..DEMO_TICKS {
        player.set_position(Point3::new(tick as f32 * DEMO_SPEED, 24.0, 0.0));
        engine.tick(Instant::now());

        for event in events.try_iter() {
            match event {
                WorldEvent::ChunkLoaded { .. } => loaded += 1,
                WorldEvent::ChunkReady { .. } => meshes += 1,
                WorldEvent::ChunkRemoved { .. } => removed += 1,
                WorldEvent::PassCompleted { .. } => {}
            }
        }
        thread::sleep(TICK_DURATION);
    }

    let world = engine.active_world();
    info!(
        "Fly-over finished: {} chunks loaded, {} meshes rendered, {} chunks removed",
        loaded, meshes, removed
    );
    info!("{:?}", world.stats());
    Ok(())
}
