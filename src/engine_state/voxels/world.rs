//! # World Module
//!
//! This module provides the `World` struct, the coordinator that keeps the set of
//! chunks in line with where the observers are.
//!
//! ## Architecture
//!
//! The chunks and the registered subsystems live in one `WorldState` behind a single
//! coarse lock (`MtResource`). The background chunk-state pass holds that lock for its
//! whole run. The thread calling `update` only ever blocks on it while no pass is in
//! flight; otherwise it uses the `try_` variants and skips the work for this tick.
//!
//! Settings read by the pass (sunlight level, reload-all request) and the diagnostic
//! counters are atomics in `WorldShared`, so they can change while a pass runs. The
//! geometry waiting for the renderer also lives there, in a queue with its own small
//! lock: the pass pushes each mesh as soon as it is built and the tick drains it, even
//! while the pass still holds the coarse lock.
//!
//! ## Tick
//!
//! Every call to `update` does, in order:
//! 1. at most one queued block removal (strict FIFO)
//! 2. a reconciliation against the frontier, if no pass is in flight and either the
//!    update interval elapsed or the world has no chunks
//! 3. a new chunk-state pass, if none is in flight
//! 4. hands at most `render_limit` queued meshes to the renderer, every tick

use std::{
    collections::{HashSet, VecDeque},
    fs, io,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering},
        mpsc::Receiver,
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
};

use cgmath::Point3;
use log::{debug, info, warn};
use web_time::Instant;

use crate::{
    config::{WorldConfig, MAX_SUNLIGHT_LEVEL},
    core::MtResource,
    engine_state::task_management::{
        task::{CompletedTask, OwnerId, TaskKind},
        TaskManager,
    },
    error::CommandError,
};

use super::{
    block::block_type::BlockType,
    chunk::mesh::ChunkMesh,
    chunk_store::ChunkStore,
    events::{EventBus, WorldEvent},
    frontier::compute_desired_chunks,
    generation::{generator_from_config, ChunkGenerator, WorldSubsystem},
    observer::Observer,
    spatial::{world_to_local_block, ChunkKey},
    tasks::{ChunkStateReport, ChunkStateUpdateTask},
};

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Everything guarded by a world's coarse lock.
#[derive(Default)]
pub struct WorldState {
    pub chunks: ChunkStore,
    pub subsystems: Vec<Box<dyn WorldSubsystem>>,
}

/// Diagnostic snapshot of a world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Chunks held by the world after the last pass.
    pub chunks_loaded: usize,
    /// Chunks with up to date geometry after the last pass.
    pub active_chunks: usize,
    pub passes_dispatched: u64,
    pub passes_completed: u64,
    /// Chunk loads that failed, over the world's lifetime.
    pub load_failures: u64,
    /// Geometry builds that failed, over the world's lifetime.
    pub geometry_failures: u64,
}

/// Fresh geometry of one chunk, waiting for the renderer.
pub type ReadyMesh = (ChunkKey, Arc<ChunkMesh>);

/// Settings and counters shared between a world and its background pass.
#[derive(Debug)]
pub struct WorldShared {
    sunlight_level: AtomicU8,
    reload_all: AtomicBool,
    chunk_count: AtomicUsize,
    ready_meshes: Mutex<VecDeque<ReadyMesh>>,
    chunks_loaded: AtomicUsize,
    active_chunks: AtomicUsize,
    passes_dispatched: AtomicU64,
    passes_completed: AtomicU64,
    load_failures: AtomicU64,
    geometry_failures: AtomicU64,
}

impl WorldShared {
    pub fn new(sunlight_level: u8) -> Self {
        WorldShared {
            sunlight_level: AtomicU8::new(sunlight_level.min(MAX_SUNLIGHT_LEVEL)),
            reload_all: AtomicBool::new(false),
            chunk_count: AtomicUsize::new(0),
            ready_meshes: Mutex::new(VecDeque::new()),
            chunks_loaded: AtomicUsize::new(0),
            active_chunks: AtomicUsize::new(0),
            passes_dispatched: AtomicU64::new(0),
            passes_completed: AtomicU64::new(0),
            load_failures: AtomicU64::new(0),
            geometry_failures: AtomicU64::new(0),
        }
    }

    pub fn sunlight_level(&self) -> u8 {
        self.sunlight_level.load(Ordering::Acquire)
    }

    /// Clamped to `MAX_SUNLIGHT_LEVEL`.
    pub fn set_sunlight_level(&self, level: u8) {
        self.sunlight_level
            .store(level.min(MAX_SUNLIGHT_LEVEL), Ordering::Release);
    }

    /// Asks the next pass to rebuild the geometry of every chunk.
    pub fn request_reload_all(&self) {
        self.reload_all.store(true, Ordering::Release);
    }

    pub fn is_reload_all_requested(&self) -> bool {
        self.reload_all.load(Ordering::Acquire)
    }

    /// Consumes a pending reload-all request.
    pub fn take_reload_all(&self) -> bool {
        self.reload_all.swap(false, Ordering::AcqRel)
    }

    /// Chunks in the store as of the last reconciliation or pass.
    pub fn chunk_count(&self) -> usize {
        self.chunk_count.load(Ordering::Acquire)
    }

    pub fn set_chunk_count(&self, count: usize) {
        self.chunk_count.store(count, Ordering::Release);
    }

    fn ready_meshes(&self) -> MutexGuard<'_, VecDeque<ReadyMesh>> {
        self.ready_meshes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues fresh geometry for the renderer.
    ///
    /// Geometry of the same chunk still waiting is replaced in place. An empty mesh has
    /// nothing to draw and only drops what was waiting for that chunk.
    pub fn queue_ready_mesh(&self, key: ChunkKey, mesh: Arc<ChunkMesh>) {
        let mut ready = self.ready_meshes();
        if mesh.is_empty() {
            ready.retain(|(queued, _)| *queued != key);
            return;
        }
        match ready.iter_mut().find(|(queued, _)| *queued == key) {
            Some(entry) => entry.1 = mesh,
            None => ready.push_back((key, mesh)),
        }
    }

    /// Takes at most `limit` queued meshes, oldest first.
    pub fn take_ready_meshes(&self, limit: usize) -> Vec<ReadyMesh> {
        let mut ready = self.ready_meshes();
        let count = limit.min(ready.len());
        ready.drain(..count).collect()
    }

    /// Drops queued geometry of chunks in `removed`.
    pub fn discard_ready_meshes(&self, removed: &HashSet<ChunkKey>) {
        self.ready_meshes().retain(|(key, _)| !removed.contains(key));
    }

    pub fn ready_mesh_count(&self) -> usize {
        self.ready_meshes().len()
    }

    /// Folds the outcome of a pass into the counters.
    pub fn record_pass(&self, report: &ChunkStateReport) {
        self.set_chunk_count(report.total_chunks);
        self.chunks_loaded.store(report.total_chunks, Ordering::Relaxed);
        self.active_chunks.store(report.active_chunks, Ordering::Relaxed);
        self.load_failures
            .fetch_add(report.load_failures as u64, Ordering::Relaxed);
        self.geometry_failures
            .fetch_add(report.geometry_failures as u64, Ordering::Relaxed);
    }

    pub fn stats(&self) -> WorldStats {
        WorldStats {
            chunks_loaded: self.chunks_loaded.load(Ordering::Relaxed),
            active_chunks: self.active_chunks.load(Ordering::Relaxed),
            passes_dispatched: self.passes_dispatched.load(Ordering::Relaxed),
            passes_completed: self.passes_completed.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            geometry_failures: self.geometry_failures.load(Ordering::Relaxed),
        }
    }
}

/// A streamed voxel world.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use cgmath::Point3;
/// use voxel_streaming::{
///     config::WorldConfig,
///     engine_state::{
///         task_management::TaskManager,
///         voxels::{observer::TrackedPosition, world::World},
///     },
/// };
///
/// let mut task_manager = TaskManager::new(1)?;
/// let mut world = World::new(WorldConfig::default());
/// let player = Arc::new(TrackedPosition::new(Point3::new(0.0, 0.0, 0.0)));
/// world.add_observer(&player);
///
/// loop {
///     for completed in task_manager.process_completed_tasks() {
///         world.handle_task_completed(&completed);
///     }
///     world.update(&mut task_manager, web_time::Instant::now());
///     task_manager.process_queued_tasks();
/// #   break;
/// }
/// # Ok::<(), voxel_streaming::error::EngineError>(())
/// ```
pub struct World {
    owner: OwnerId,
    config: WorldConfig,
    state: MtResource<WorldState>,
    shared: Arc<WorldShared>,
    generator: Arc<dyn ChunkGenerator>,
    events: EventBus,
    observers: Vec<Weak<dyn Observer>>,
    removal_queue: VecDeque<Point3<f32>>,
    update_in_flight: AtomicBool,
    last_reconciliation: Option<Instant>,
}

impl World {
    /// Creates an empty world using the generator named in `config`.
    pub fn new(config: WorldConfig) -> Self {
        let generator = generator_from_config(&config.generator);
        Self::with_generator(config, generator)
    }

    /// Creates an empty world filled by a caller-provided generator.
    pub fn with_generator(config: WorldConfig, generator: Arc<dyn ChunkGenerator>) -> Self {
        let owner = NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed);
        info!(
            "Creating world {} (visible distance {}, storage {})",
            owner,
            config.visible_distance,
            config.storage_dir.display()
        );

        World {
            owner,
            shared: Arc::new(WorldShared::new(config.sunlight_level)),
            config,
            state: MtResource::new(WorldState::default()),
            generator,
            events: EventBus::default(),
            observers: Vec::new(),
            removal_queue: VecDeque::new(),
            update_in_flight: AtomicBool::new(false),
            last_reconciliation: None,
        }
    }

    /// Id carried by every task this world publishes.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Runs one tick. Returns the number of chunks handed to the renderer.
    pub fn update(&mut self, task_manager: &mut TaskManager, now: Instant) -> usize {
        self.process_removal_queue();

        if !self.is_update_in_flight() && self.is_reconciliation_due(now) {
            self.reconcile();
            self.last_reconciliation = Some(now);
        }

        if !self.is_update_in_flight() {
            self.dispatch_update(task_manager);
        }

        self.render_chunks()
    }

    fn is_reconciliation_due(&self, now: Instant) -> bool {
        let interval_elapsed = match self.last_reconciliation {
            Some(last) => now.saturating_duration_since(last) >= self.config.update_interval(),
            None => true,
        };
        interval_elapsed || self.shared.chunk_count() == 0
    }

    fn process_removal_queue(&mut self) {
        let Some(&position) = self.removal_queue.front() else {
            return;
        };
        let Some(mut state) = self.state.try_get_mut() else {
            return;
        };
        if state.chunks.remove_block_at(position) {
            debug!("Removed block at {:?}", position);
            self.removal_queue.pop_front();
        }
    }

    /// Brings the chunk store in line with the frontier around the live observers.
    fn reconcile(&mut self) {
        self.observers.retain(|observer| observer.strong_count() > 0);
        let positions: Vec<Point3<f32>> = self
            .observers
            .iter()
            .filter_map(Weak::upgrade)
            .map(|observer| observer.position())
            .collect();
        let desired = compute_desired_chunks(positions, self.config.visible_distance);

        let removed = {
            let mut state = self.state.get_mut();
            for (_, chunk) in state.chunks.iter_mut() {
                chunk.mark_for_deletion(true);
                chunk.set_distance(-1);
            }
            for (key, distance) in &desired {
                let chunk = state.chunks.get_or_create(*key);
                chunk.mark_for_deletion(false);
                chunk.set_distance(*distance);
            }
            let removed = state.chunks.sweep_marked();
            self.shared.set_chunk_count(state.chunks.len());
            removed
        };
        if !removed.is_empty() {
            let keys: HashSet<ChunkKey> = removed.iter().map(|(key, _)| *key).collect();
            self.shared.discard_ready_meshes(&keys);
        }

        debug!(
            "Reconciled world {}: {} desired, {} removed",
            self.owner,
            desired.len(),
            removed.len()
        );
        for (key, distance) in removed {
            self.events.publish(WorldEvent::ChunkRemoved { key, distance });
        }
    }

    fn dispatch_update(&mut self, task_manager: &mut TaskManager) {
        self.update_in_flight.store(true, Ordering::Release);
        self.shared.passes_dispatched.fetch_add(1, Ordering::Relaxed);
        task_manager.publish_task(Box::new(ChunkStateUpdateTask::new(
            self.owner,
            self.state.clone(),
            self.shared.clone(),
            self.generator.clone(),
            self.events.clone(),
        )));
    }

    /// Hands at most `render_limit` queued meshes to the renderer as `ChunkReady` events.
    ///
    /// Never touches the coarse lock, so it keeps going while a pass runs.
    fn render_chunks(&mut self) -> usize {
        let ready = self.shared.take_ready_meshes(self.config.render_limit);
        let rendered = ready.len();
        for (key, mesh) in ready {
            self.events.publish(WorldEvent::ChunkReady { key, mesh });
        }
        rendered
    }

    /// Handles a task returned by the `TaskManager`.
    ///
    /// Returns `false`, without touching anything, when the task belongs to someone else.
    pub fn handle_task_completed(&mut self, completed: &CompletedTask) -> bool {
        if completed.owner != self.owner {
            return false;
        }

        match completed.kind {
            TaskKind::UpdateChunkState => {
                self.update_in_flight.store(false, Ordering::Release);
                self.shared.passes_completed.fetch_add(1, Ordering::Relaxed);

                match &completed.outcome {
                    Ok(_) => match completed.output::<ChunkStateReport>() {
                        Some(report) => {
                            debug!("World {} pass completed: {:?}", self.owner, report);
                            self.events.publish(WorldEvent::PassCompleted {
                                report: report.clone(),
                            });
                        }
                        None => warn!("World {} pass returned an unexpected output", self.owner),
                    },
                    Err(error) => warn!("World {} pass failed: {}", self.owner, error),
                }
            }
        }
        true
    }

    pub fn is_update_in_flight(&self) -> bool {
        self.update_in_flight.load(Ordering::Acquire)
    }

    /// Starts streaming chunks around `observer`. Adding the same observer twice is
    /// allowed; each entry needs its own `remove_observer`.
    pub fn add_observer<O: Observer + 'static>(&mut self, observer: &Arc<O>) {
        let observer: Weak<O> = Arc::downgrade(observer);
        self.observers.push(observer);
    }

    /// Removes the first entry referring to `observer`. Returns whether one was found.
    pub fn remove_observer<O: Observer + 'static>(&mut self, observer: &Arc<O>) -> bool {
        let target = Arc::as_ptr(observer).cast::<()>();
        match self
            .observers
            .iter()
            .position(|entry| entry.as_ptr().cast::<()>() == target)
        {
            Some(index) => {
                self.observers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// The type of the block at world position `position`, if its chunk is loaded.
    ///
    /// Does not wait for the world lock: `None` while a background pass holds it.
    pub fn block_at(&self, position: Point3<f32>) -> Option<BlockType> {
        let state = self.state.try_get()?;
        let chunk = state.chunks.chunk_at_position(position)?;
        if !chunk.is_loaded() {
            return None;
        }
        chunk
            .block_at(world_to_local_block(position))
            .map(|block| block.get_type())
    }

    /// Queues the block at `position` for removal on a later tick.
    ///
    /// Positions outside the chunk grid can never be removed and are not queued.
    pub fn remove_block_at_position(&mut self, position: Point3<f32>) -> bool {
        if ChunkKey::from_world(position).is_none() {
            warn!("Ignoring block removal at {:?}: outside the chunk grid", position);
            return false;
        }
        self.removal_queue.push_back(position);
        true
    }

    pub fn pending_removals(&self) -> usize {
        self.removal_queue.len()
    }

    /// Registers a new event listener.
    pub fn subscribe(&self) -> Receiver<WorldEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> WorldStats {
        self.shared.stats()
    }

    /// Number of chunks held, as of the last reconciliation or pass.
    pub fn chunk_count(&self) -> usize {
        self.shared.chunk_count()
    }

    /// Takes effect at the next reconciliation.
    pub fn set_visible_distance(&mut self, distance: u32) {
        info!("World {} visible distance set to {}", self.owner, distance);
        self.config.visible_distance = distance;
    }

    pub fn visible_distance(&self) -> u32 {
        self.config.visible_distance
    }

    /// Changes the global light level and rebuilds every chunk's geometry on the next pass.
    pub fn set_sunlight_level(&self, level: u8) {
        info!("World {} sunlight level set to {}", self.owner, level);
        self.shared.set_sunlight_level(level);
        self.reload_all_chunks();
    }

    pub fn sunlight_level(&self) -> u8 {
        self.shared.sunlight_level()
    }

    /// Rebuilds every chunk's geometry on the next pass.
    pub fn reload_all_chunks(&self) {
        self.shared.request_reload_all();
    }

    pub fn is_reload_all_requested(&self) -> bool {
        self.shared.is_reload_all_requested()
    }

    /// Deletes every file directly inside the storage directory. Sub-directories and the
    /// directory itself are kept; a missing directory counts as already empty.
    ///
    /// Returns the number of files deleted.
    pub fn reset_storage(&self) -> Result<usize, CommandError> {
        let path = &self.config.storage_dir;
        let storage_error = |source: io::Error| CommandError::Storage {
            path: path.clone(),
            source,
        };

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(error) => return Err(storage_error(error)),
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(storage_error)?;
            if entry.file_type().map_err(storage_error)?.is_file() {
                fs::remove_file(entry.path()).map_err(storage_error)?;
                removed += 1;
            }
        }

        info!("Cleared {} file(s) from {}", removed, path.display());
        Ok(removed)
    }

    /// Adds a subsystem processed at the start of every pass. Waits for a running pass.
    pub fn add_subsystem(&self, subsystem: Box<dyn WorldSubsystem>) {
        info!("World {} registered subsystem '{}'", self.owner, subsystem.name());
        self.state.get_mut().subsystems.push(subsystem);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        config::GeneratorConfig,
        engine_state::{
            task_management::tests::wait_for_completions,
            voxels::{
                block::block_side::BlockSide,
                chunk::{mesh::Face, BlockStorage},
                observer::TrackedPosition,
                tasks::update_chunk_state,
            },
        },
        error::GenerationError,
    };

    struct FailingGenerator;

    impl ChunkGenerator for FailingGenerator {
        fn generate(&self, key: ChunkKey, _blocks: &mut BlockStorage) -> Result<(), GenerationError> {
            Err(GenerationError::Failed {
                key,
                message: "storage offline".to_string(),
            })
        }
    }

    /// Holds the pass inside the subsystem step until released.
    struct GateSubsystem {
        started: Mutex<std::sync::mpsc::Sender<()>>,
        release: Mutex<Receiver<()>>,
    }

    impl WorldSubsystem for GateSubsystem {
        fn name(&self) -> &str {
            "gate"
        }

        fn process(&mut self, _chunks: &mut ChunkStore) {
            let _ = self.started.lock().unwrap().send(());
            let _ = self
                .release
                .lock()
                .unwrap()
                .recv_timeout(Duration::from_secs(5));
        }
    }

    fn mesh_with_faces(faces: usize) -> Arc<ChunkMesh> {
        let mut mesh = ChunkMesh::default();
        for i in 0..faces as i32 {
            mesh.push(Face::new(i, 0, 0, BlockType::Stone, BlockSide::Top, 15));
        }
        Arc::new(mesh)
    }

    fn flat_config(visible_distance: u32) -> WorldConfig {
        WorldConfig {
            visible_distance,
            generator: GeneratorConfig::Flat { ground_level: 16 },
            ..WorldConfig::default()
        }
    }

    fn observed_world(config: WorldConfig, at: Point3<f32>) -> (World, Arc<TrackedPosition>) {
        let mut world = World::new(config);
        let observer = Arc::new(TrackedPosition::new(at));
        world.add_observer(&observer);
        (world, observer)
    }

    fn finish_pass(world: &mut World, task_manager: &mut TaskManager) {
        for completed in wait_for_completions(task_manager, 1) {
            world.handle_task_completed(&completed);
        }
        assert!(!world.is_update_in_flight());
    }

    #[test]
    fn first_tick_creates_the_frontier_and_dispatches_a_pass() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let (mut world, _observer) = observed_world(flat_config(2), Point3::new(1.0, 1.0, 1.0));
        let events = world.subscribe();

        world.update(&mut task_manager, Instant::now());
        assert!(world.is_update_in_flight());
        finish_pass(&mut world, &mut task_manager);

        assert_eq!(world.chunk_count(), 7);
        let stats = world.stats();
        assert_eq!(stats.passes_dispatched, 1);
        assert_eq!(stats.passes_completed, 1);
        assert_eq!(stats.active_chunks, 7);
        assert_eq!(world.block_at(Point3::new(1.0, 1.0, 1.0)), Some(BlockType::Stone));
        assert!(events
            .try_iter()
            .any(|event| matches!(event, WorldEvent::PassCompleted { .. })));
    }

    #[test]
    fn kept_chunks_keep_their_block_data() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let (mut world, _observer) = observed_world(flat_config(2), Point3::new(1.0, 1.0, 1.0));
        let start = Instant::now();

        world.update(&mut task_manager, start);
        finish_pass(&mut world, &mut task_manager);

        let target = Point3::new(3.5, 2.5, 3.5);
        world.remove_block_at_position(target);
        world.update(&mut task_manager, start + Duration::from_millis(10));
        assert_eq!(world.pending_removals(), 0);
        finish_pass(&mut world, &mut task_manager);

        world.update(&mut task_manager, start + Duration::from_secs(2));
        finish_pass(&mut world, &mut task_manager);

        assert_eq!(world.chunk_count(), 7);
        assert_eq!(world.block_at(target), Some(BlockType::Air));
    }

    #[test]
    fn chunks_out_of_range_are_erased_exactly_once() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let (mut world, observer) = observed_world(flat_config(1), Point3::new(1.0, 1.0, 1.0));
        let events = world.subscribe();
        let start = Instant::now();

        world.update(&mut task_manager, start);
        finish_pass(&mut world, &mut task_manager);

        observer.set_position(Point3::new(100.0, 1.0, 1.0));
        for tick in 1..=3 {
            world.update(&mut task_manager, start + Duration::from_secs(2 * tick));
            finish_pass(&mut world, &mut task_manager);
        }

        let removed: Vec<(ChunkKey, i32)> = events
            .try_iter()
            .filter_map(|event| match event {
                WorldEvent::ChunkRemoved { key, distance } => Some((key, distance)),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec![(ChunkKey::new(0, 0, 0), -1)]);
        assert_eq!(world.chunk_count(), 1);
        assert_eq!(world.block_at(Point3::new(100.0, 1.0, 1.0)), Some(BlockType::Stone));
    }

    #[test]
    fn at_most_one_pass_is_in_flight() {
        let mut task_manager = TaskManager::new(2).unwrap();
        let (mut world, observer) = observed_world(flat_config(3), Point3::new(0.0, 0.0, 0.0));
        let start = Instant::now();

        for tick in 0..200u64 {
            for completed in task_manager.process_completed_tasks() {
                world.handle_task_completed(&completed);
            }
            observer.set_position(Point3::new(tick as f32, 0.0, 0.0));
            world.update(&mut task_manager, start + Duration::from_millis(tick * 50));
            task_manager.process_queued_tasks();

            let stats = world.stats();
            assert!(stats.passes_dispatched <= stats.passes_completed + 1);
            assert!(task_manager.tasks_in_flight() + task_manager.queued_task_count() <= 1);
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    #[test]
    fn removal_queue_is_strictly_fifo() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let (mut world, _observer) = observed_world(flat_config(1), Point3::new(1.0, 1.0, 1.0));
        let start = Instant::now();
        world.update(&mut task_manager, start);
        finish_pass(&mut world, &mut task_manager);

        let nowhere = Point3::new(5000.0, 1.0, 1.0);
        let loaded = Point3::new(2.0, 2.0, 2.0);
        world.remove_block_at_position(nowhere);
        world.remove_block_at_position(loaded);

        for tick in 1..=5 {
            world.update(&mut task_manager, start + Duration::from_millis(tick));
            finish_pass(&mut world, &mut task_manager);
        }

        assert_eq!(world.pending_removals(), 2);
        assert_eq!(world.block_at(loaded), Some(BlockType::Stone));
    }

    #[test]
    fn foreign_completions_are_ignored() {
        let mut task_manager = TaskManager::new(0).unwrap();
        let (mut world, _observer) = observed_world(flat_config(1), Point3::new(0.0, 0.0, 0.0));
        world.update(&mut task_manager, Instant::now());
        assert!(world.is_update_in_flight());

        let foreign = CompletedTask {
            owner: world.owner() + 1000,
            kind: TaskKind::UpdateChunkState,
            outcome: Ok(Box::new(ChunkStateReport::default())),
        };
        assert!(!world.handle_task_completed(&foreign));
        assert!(world.is_update_in_flight());

        let own = CompletedTask {
            owner: world.owner(),
            kind: TaskKind::UpdateChunkState,
            outcome: Ok(Box::new(ChunkStateReport::default())),
        };
        assert!(world.handle_task_completed(&own));
        assert!(!world.is_update_in_flight());
        assert_eq!(world.stats().passes_completed, 1);
    }

    #[test]
    fn failing_generator_leaves_chunks_unloaded() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let mut world = World::with_generator(flat_config(1), Arc::new(FailingGenerator));
        let observer = Arc::new(TrackedPosition::new(Point3::new(0.0, 0.0, 0.0)));
        world.add_observer(&observer);
        let events = world.subscribe();

        world.update(&mut task_manager, Instant::now());
        finish_pass(&mut world, &mut task_manager);

        assert_eq!(world.chunk_count(), 1);
        assert_eq!(world.block_at(Point3::new(0.0, 0.0, 0.0)), None);
        let stats = world.stats();
        assert_eq!(stats.passes_completed, 1);
        assert_eq!(stats.load_failures, 1);
        assert!(events.try_iter().any(|event| matches!(
            event,
            WorldEvent::PassCompleted { report } if report.load_failures == 1
        )));
    }

    #[test]
    fn rendering_is_capped_per_tick() {
        let mut task_manager = TaskManager::new(0).unwrap();
        let (mut world, _observer) = observed_world(flat_config(2), Point3::new(1.0, 1.0, 1.0));
        world.update(&mut task_manager, Instant::now());
        update_chunk_state(
            &mut world.state.get_mut(),
            &world.shared,
            world.generator.as_ref(),
            &world.events,
        );

        // The chunk above ground has an empty mesh, the other six have geometry.
        assert_eq!(world.render_chunks(), 4);
        assert_eq!(world.render_chunks(), 2);
        assert_eq!(world.render_chunks(), 0);
    }

    #[test]
    fn rendering_continues_while_a_pass_holds_the_lock() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let (mut world, _observer) = observed_world(flat_config(2), Point3::new(1.0, 1.0, 1.0));
        world.reconcile();
        update_chunk_state(
            &mut world.state.get_mut(),
            &world.shared,
            world.generator.as_ref(),
            &world.events,
        );
        assert_eq!(world.shared.ready_mesh_count(), 6);

        let (started_sender, started) = std::sync::mpsc::channel();
        let (release, release_receiver) = std::sync::mpsc::channel();
        world.add_subsystem(Box::new(GateSubsystem {
            started: Mutex::new(started_sender),
            release: Mutex::new(release_receiver),
        }));
        let events = world.subscribe();
        let start = Instant::now();

        assert_eq!(world.update(&mut task_manager, start), 4);
        started.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(world.is_update_in_flight());
        assert!(world.state.try_get_mut().is_none());

        assert_eq!(world.update(&mut task_manager, start + Duration::from_millis(5)), 2);
        assert_eq!(world.update(&mut task_manager, start + Duration::from_millis(10)), 0);
        let ready = events
            .try_iter()
            .filter(|event| matches!(event, WorldEvent::ChunkReady { .. }))
            .count();
        assert_eq!(ready, 6);

        release.send(()).unwrap();
        finish_pass(&mut world, &mut task_manager);
    }

    #[test]
    fn queued_geometry_is_replaced_per_chunk() {
        let shared = WorldShared::new(15);
        let first = ChunkKey::new(0, 0, 0);
        let second = ChunkKey::new(16, 0, 0);

        shared.queue_ready_mesh(first, mesh_with_faces(1));
        shared.queue_ready_mesh(second, mesh_with_faces(2));
        shared.queue_ready_mesh(first, mesh_with_faces(3));
        assert_eq!(shared.ready_mesh_count(), 2);

        let taken = shared.take_ready_meshes(4);
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].0, first);
        assert_eq!(taken[0].1.face_count(), 3);

        shared.queue_ready_mesh(second, mesh_with_faces(1));
        shared.queue_ready_mesh(second, Arc::new(ChunkMesh::default()));
        assert_eq!(shared.ready_mesh_count(), 0);
    }

    #[test]
    fn removed_chunks_are_not_rendered() {
        let mut task_manager = TaskManager::new(0).unwrap();
        let (mut world, observer) = observed_world(flat_config(2), Point3::new(1.0, 1.0, 1.0));
        world.update(&mut task_manager, Instant::now());
        update_chunk_state(
            &mut world.state.get_mut(),
            &world.shared,
            world.generator.as_ref(),
            &world.events,
        );
        assert_eq!(world.shared.ready_mesh_count(), 6);

        observer.set_position(Point3::new(500.0, 1.0, 1.0));
        world.reconcile();

        assert_eq!(world.shared.ready_mesh_count(), 0);
        assert_eq!(world.render_chunks(), 0);
    }

    #[test]
    fn far_away_observer_streams_without_overflow() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let far = Point3::new(3.0e9, 1.0, 1.0);
        let (mut world, _observer) = observed_world(flat_config(2), far);

        world.update(&mut task_manager, Instant::now());
        finish_pass(&mut world, &mut task_manager);

        assert_eq!(world.chunk_count(), 7);
        assert_eq!(world.block_at(far), Some(BlockType::Stone));
        assert!(!world.remove_block_at_position(Point3::new(f32::NAN, 0.0, 0.0)));
        assert_eq!(world.pending_removals(), 0);
    }

    #[test]
    fn block_queries_do_not_wait_for_a_running_pass() {
        let (world, _observer) = observed_world(flat_config(1), Point3::new(1.0, 1.0, 1.0));
        let held = world.state.clone();
        let _guard = held.get_mut();

        assert_eq!(world.block_at(Point3::new(1.0, 1.0, 1.0)), None);
        assert_eq!(world.chunk_count(), 0);
    }

    #[test]
    fn observers_are_tracked_by_identity() {
        let mut world = World::new(flat_config(1));
        let first = Arc::new(TrackedPosition::new(Point3::new(0.0, 0.0, 0.0)));
        let second = Arc::new(TrackedPosition::new(Point3::new(0.0, 0.0, 0.0)));
        world.add_observer(&first);
        world.add_observer(&first);
        world.add_observer(&second);

        assert!(world.remove_observer(&first));
        assert_eq!(world.observer_count(), 2);
        assert!(world.remove_observer(&second));
        assert!(!world.remove_observer(&second));
        assert_eq!(world.observer_count(), 1);
    }

    #[test]
    fn dropped_observers_stop_streaming() {
        let mut task_manager = TaskManager::new(1).unwrap();
        let (mut world, observer) = observed_world(flat_config(2), Point3::new(1.0, 1.0, 1.0));
        let start = Instant::now();
        world.update(&mut task_manager, start);
        finish_pass(&mut world, &mut task_manager);
        assert_eq!(world.chunk_count(), 7);

        drop(observer);
        world.update(&mut task_manager, start + Duration::from_secs(2));
        finish_pass(&mut world, &mut task_manager);

        assert_eq!(world.chunk_count(), 0);
        assert_eq!(world.observer_count(), 0);
    }

    #[test]
    fn sunlight_change_requests_a_reload() {
        let world = World::new(flat_config(1));
        assert_eq!(world.sunlight_level(), 15);
        world.set_sunlight_level(7);
        assert_eq!(world.sunlight_level(), 7);
        assert!(world.is_reload_all_requested());
    }
}
