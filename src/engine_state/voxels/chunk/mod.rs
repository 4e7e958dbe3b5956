//! # Chunk Module
//!
//! This module provides the `Chunk` struct: one fixed-size cell of the voxel grid with
//! its block data, its place in the streaming lifecycle, its frontier distance and the
//! geometry derived from its blocks.
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded --load--> Loaded --calculate geometry--> GeometryReady
//!                      ^                                 |
//!                      +---- GeometryPending <--mark-----+
//! ```
//!
//! The deletion mark is orthogonal to the state: it is set on every chunk at the start
//! of a reconciliation, cleared on the chunks that are still wanted, and the chunk store
//! erases whatever is still marked.
//!
//! ## Block Storage
//!
//! Blocks are stored densely, with a bit vector mirroring which positions hold an opaque
//! block. Face culling only ever asks "is the neighbor opaque?", which the bit vector
//! answers without decoding a block.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use bitvec::prelude::BitVec;
use cgmath::Point3;
use log::debug;

use crate::error::{GenerationError, GeometryError};

use super::{
    block::{block_side::BlockSide, block_type::BlockType, Block},
    generation::ChunkGenerator,
    spatial::{is_local_in_bounds, ChunkKey, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z, CHUNK_VOLUME},
};

pub mod mesh;

use mesh::{ChunkMesh, Face};

/// Dense block storage for one chunk.
///
/// Blocks are laid out x-fastest, then y, then z.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStorage {
    blocks: Vec<Block>,
    opaque: BitVec,
}

impl BlockStorage {
    /// Storage filled with air.
    pub fn new() -> Self {
        BlockStorage {
            blocks: vec![Block::AIR; CHUNK_VOLUME],
            opaque: BitVec::repeat(false, CHUNK_VOLUME),
        }
    }

    fn index(local: Point3<i32>) -> Option<usize> {
        if !is_local_in_bounds(local) {
            return None;
        }
        Some((local.x + CHUNK_SIZE_X * local.y + CHUNK_SIZE_X * CHUNK_SIZE_Y * local.z) as usize)
    }

    /// The block at `local`, or `None` outside the chunk.
    pub fn get(&self, local: Point3<i32>) -> Option<Block> {
        Self::index(local).map(|index| self.blocks[index])
    }

    /// Sets the block at `local`. Returns `false` if `local` is outside the chunk.
    pub fn set(&mut self, local: Point3<i32>, block_type: BlockType) -> bool {
        match Self::index(local) {
            Some(index) => {
                self.blocks[index] = Block::new(block_type);
                self.opaque.set(index, block_type.is_opaque());
                true
            }
            None => false,
        }
    }

    /// Whether the block at `local` hides adjacent faces. Outside the chunk is never opaque.
    pub fn is_opaque(&self, local: Point3<i32>) -> bool {
        Self::index(local).is_some_and(|index| self.opaque[index])
    }

    /// Number of blocks that produce geometry.
    pub fn count_visible(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.get_type().is_visible())
            .count()
    }
}

impl Default for BlockStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a chunk is in the streaming lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Created, block data not generated yet.
    Unloaded,
    /// Block data present, geometry never built.
    Loaded,
    /// Block data present, geometry out of date.
    GeometryPending,
    /// Geometry matches the block data.
    GeometryReady,
}

/// Neighbors of a chunk indexed by `BlockSide as usize`.
pub type Neighbors<'a> = [Option<&'a Chunk>; 6];

/// Represents one chunk of the voxel world.
#[derive(Debug)]
pub struct Chunk {
    key: ChunkKey,
    blocks: BlockStorage,
    state: ChunkState,
    marked_for_deletion: bool,
    /// Frontier distance from the nearest observer, -1 when unset.
    distance: i32,
    mesh: Option<Arc<ChunkMesh>>,
}

impl Chunk {
    /// Creates an unloaded chunk.
    pub fn new(key: ChunkKey) -> Self {
        Chunk {
            key,
            blocks: BlockStorage::new(),
            state: ChunkState::Unloaded,
            marked_for_deletion: false,
            distance: -1,
            mesh: None,
        }
    }

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn blocks(&self) -> &BlockStorage {
        &self.blocks
    }

    pub fn is_loaded(&self) -> bool {
        self.state != ChunkState::Unloaded
    }

    pub fn is_geometry_calculated(&self) -> bool {
        self.state == ChunkState::GeometryReady
    }

    /// A chunk counts as active once it is loaded and its geometry is up to date.
    pub fn is_active(&self) -> bool {
        self.state == ChunkState::GeometryReady
    }

    /// Fills the block storage using `generator`.
    ///
    /// The generator writes into fresh storage that only replaces the chunk's blocks on
    /// success, so a failing or panicking generator leaves the chunk exactly as it was.
    pub fn load(&mut self, generator: &dyn ChunkGenerator) -> Result<(), GenerationError> {
        let key = self.key;
        let mut blocks = BlockStorage::new();

        match panic::catch_unwind(AssertUnwindSafe(|| generator.generate(key, &mut blocks))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => return Err(error),
            Err(_) => return Err(GenerationError::Panicked { key }),
        }

        self.blocks = blocks;
        self.state = ChunkState::Loaded;
        debug!("Loaded chunk {}", key);
        Ok(())
    }

    /// Requests a geometry rebuild. Idempotent, valid in every state.
    pub fn mark_for_geometry_calculation(&mut self) {
        if self.state == ChunkState::GeometryReady {
            self.state = ChunkState::GeometryPending;
        }
    }

    /// Builds geometry from this chunk's blocks, using `neighbors` to cull faces on the
    /// chunk border. A missing or unloaded neighbor hides nothing.
    pub fn build_geometry(
        &self,
        neighbors: &Neighbors<'_>,
        sunlight_level: u8,
    ) -> Result<ChunkMesh, GeometryError> {
        if !self.is_loaded() {
            return Err(GeometryError::NotLoaded { key: self.key });
        }

        let mut mesh = ChunkMesh::default();
        for k in 0..CHUNK_SIZE_Z {
            for j in 0..CHUNK_SIZE_Y {
                for i in 0..CHUNK_SIZE_X {
                    let local = Point3::new(i, j, k);
                    let block_type = match self.blocks.get(local) {
                        Some(block) => block.get_type(),
                        None => continue,
                    };
                    if !block_type.is_visible() {
                        continue;
                    }
                    for side in BlockSide::all() {
                        if !self.is_side_occluded(local, side, neighbors) {
                            mesh.push(Face::new(i, j, k, block_type, side, sunlight_level));
                        }
                    }
                }
            }
        }

        Ok(mesh)
    }

    fn is_side_occluded(&self, local: Point3<i32>, side: BlockSide, neighbors: &Neighbors<'_>) -> bool {
        let adjacent = local + side.offset();
        if is_local_in_bounds(adjacent) {
            return self.blocks.is_opaque(adjacent);
        }

        match neighbors[side as usize] {
            Some(neighbor) if neighbor.is_loaded() => {
                let wrapped = Point3::new(
                    adjacent.x.rem_euclid(CHUNK_SIZE_X),
                    adjacent.y.rem_euclid(CHUNK_SIZE_Y),
                    adjacent.z.rem_euclid(CHUNK_SIZE_Z),
                );
                neighbor.blocks.is_opaque(wrapped)
            }
            _ => false,
        }
    }

    /// Stores freshly built geometry and returns a shared handle to it.
    pub fn apply_geometry(&mut self, mesh: ChunkMesh) -> Arc<ChunkMesh> {
        let mesh = Arc::new(mesh);
        self.mesh = Some(mesh.clone());
        self.state = ChunkState::GeometryReady;
        mesh
    }

    /// The last geometry built for this chunk.
    pub fn mesh(&self) -> Option<&Arc<ChunkMesh>> {
        self.mesh.as_ref()
    }

    pub fn set_distance(&mut self, distance: i32) {
        self.distance = distance;
    }

    pub fn distance(&self) -> i32 {
        self.distance
    }

    pub fn mark_for_deletion(&mut self, marked: bool) {
        self.marked_for_deletion = marked;
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked_for_deletion
    }

    /// The block at chunk-local `local`.
    pub fn block_at(&self, local: Point3<i32>) -> Option<Block> {
        self.blocks.get(local)
    }

    /// Replaces a block and schedules a geometry rebuild.
    pub fn set_block(&mut self, local: Point3<i32>, block_type: BlockType) -> bool {
        if !self.blocks.set(local, block_type) {
            return false;
        }
        self.mark_for_geometry_calculation();
        true
    }

    /// Turns the block at `local` into air.
    pub fn remove_block(&mut self, local: Point3<i32>) -> bool {
        self.set_block(local, BlockType::Air)
    }
}
