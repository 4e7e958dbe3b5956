//! # Chunk State Update Task
//!
//! The background pass of a world. It takes the world's coarse lock for its whole run
//! and advances every chunk one step through its lifecycle: unloaded chunks are
//! generated, chunks whose geometry is out of date get it rebuilt.
//!
//! Every mesh built is queued for the renderer right away, so the world can hand it
//! over before the pass finishes.
//!
//! Failures are per chunk. A chunk whose generator fails stays unloaded and a chunk
//! whose geometry fails keeps its previous state; both are retried on the next pass.

use std::sync::Arc;

use log::{debug, warn};

use crate::{
    core::MtResource,
    engine_state::{
        task_management::task::{OwnerId, Task, TaskKind, TaskOutput},
        voxels::{
            events::EventBus,
            generation::ChunkGenerator,
            world::{WorldShared, WorldState},
        },
    },
};

/// Summary of one chunk-state pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStateReport {
    /// Chunks generated during this pass.
    pub chunks_loaded: usize,
    /// Chunks whose geometry was rebuilt during this pass.
    pub geometry_built: usize,
    pub load_failures: usize,
    pub geometry_failures: usize,
    /// Whether this pass honored a reload-all request.
    pub reloaded_all: bool,
    /// Chunks in the store when the pass finished.
    pub total_chunks: usize,
    /// Chunks with up to date geometry when the pass finished.
    pub active_chunks: usize,
}

/// Runs one pass over `state`.
///
/// The reload-all flag is taken at the start, so a request arriving while the pass runs
/// is kept for the next one.
pub fn update_chunk_state(
    state: &mut WorldState,
    shared: &WorldShared,
    generator: &dyn ChunkGenerator,
    events: &EventBus,
) -> ChunkStateReport {
    let mut report = ChunkStateReport::default();
    let WorldState { chunks, subsystems } = state;

    for subsystem in subsystems.iter_mut() {
        subsystem.process(chunks);
    }

    if shared.take_reload_all() {
        chunks.mark_all_for_geometry_calculation();
        report.reloaded_all = true;
    }
    let sunlight_level = shared.sunlight_level();

    let keys = chunks.keys();
    for key in &keys {
        if chunks.get(key).map_or(true, |chunk| chunk.is_loaded()) {
            continue;
        }
        match chunks.load_chunk(*key, generator, events) {
            Ok(()) => report.chunks_loaded += 1,
            Err(error) => {
                warn!("Failed to load chunk {}: {}", key, error);
                report.load_failures += 1;
            }
        }
    }

    for key in &keys {
        let needs_geometry = chunks
            .get(key)
            .is_some_and(|chunk| chunk.is_loaded() && !chunk.is_geometry_calculated());
        if !needs_geometry {
            continue;
        }
        match chunks.calculate_geometry(*key, sunlight_level) {
            Ok(mesh) => {
                shared.queue_ready_mesh(*key, mesh);
                report.geometry_built += 1;
            }
            Err(error) => {
                warn!("Failed to build geometry for chunk {}: {}", key, error);
                report.geometry_failures += 1;
            }
        }
    }

    report.total_chunks = chunks.len();
    report.active_chunks = chunks.count_active();
    shared.record_pass(&report);

    debug!(
        "Chunk state pass: {} loaded, {} meshed, {} failed, {}/{} active",
        report.chunks_loaded,
        report.geometry_built,
        report.load_failures + report.geometry_failures,
        report.active_chunks,
        report.total_chunks
    );
    report
}

/// A world's chunk-state pass, executed on a worker thread.
pub struct ChunkStateUpdateTask {
    owner: OwnerId,
    state: MtResource<WorldState>,
    shared: Arc<WorldShared>,
    generator: Arc<dyn ChunkGenerator>,
    events: EventBus,
}

impl ChunkStateUpdateTask {
    pub fn new(
        owner: OwnerId,
        state: MtResource<WorldState>,
        shared: Arc<WorldShared>,
        generator: Arc<dyn ChunkGenerator>,
        events: EventBus,
    ) -> Self {
        ChunkStateUpdateTask {
            owner,
            state,
            shared,
            generator,
            events,
        }
    }
}

impl Task for ChunkStateUpdateTask {
    fn owner(&self) -> OwnerId {
        self.owner
    }

    fn kind(&self) -> TaskKind {
        TaskKind::UpdateChunkState
    }

    /// Holds the world lock for the whole pass and returns a `ChunkStateReport`.
    fn process(&self) -> TaskOutput {
        let mut state = self.state.get_mut();
        Box::new(update_chunk_state(
            &mut state,
            &self.shared,
            self.generator.as_ref(),
            &self.events,
        ))
    }
}
