//! # Chunk Store
//!
//! The arena owning every chunk of a world, keyed by `ChunkKey`. Chunks never hold
//! references to each other: a neighbor is whatever chunk the store has under the
//! adjacent key, looked up on demand.
//!
//! The store also carries the per-chunk lifecycle steps that need more than one chunk at
//! a time: loading (which invalidates the neighbors' geometry) and geometry calculation
//! (which reads the neighbors' border blocks).

use std::{
    collections::{hash_map, HashMap},
    sync::Arc,
};

use cgmath::Point3;

use crate::error::{GenerationError, GeometryError};

use super::{
    block::{block_side::BlockSide, Block},
    chunk::{mesh::ChunkMesh, Chunk, Neighbors},
    events::{EventBus, WorldEvent},
    generation::ChunkGenerator,
    spatial::{world_to_local_block, ChunkKey, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z},
};

/// Every chunk of one world.
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: HashMap<ChunkKey, Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn contains(&self, key: &ChunkKey) -> bool {
        self.chunks.contains_key(key)
    }

    pub fn get(&self, key: &ChunkKey) -> Option<&Chunk> {
        self.chunks.get(key)
    }

    pub fn get_mut(&mut self, key: &ChunkKey) -> Option<&mut Chunk> {
        self.chunks.get_mut(key)
    }

    /// Returns the chunk at `key`, creating an unloaded one if it does not exist.
    pub fn get_or_create(&mut self, key: ChunkKey) -> &mut Chunk {
        self.chunks.entry(key).or_insert_with(|| Chunk::new(key))
    }

    pub fn iter(&self) -> hash_map::Iter<'_, ChunkKey, Chunk> {
        self.chunks.iter()
    }

    pub fn iter_mut(&mut self) -> hash_map::IterMut<'_, ChunkKey, Chunk> {
        self.chunks.iter_mut()
    }

    /// Keys of every chunk, in no particular order.
    pub fn keys(&self) -> Vec<ChunkKey> {
        self.chunks.keys().copied().collect()
    }

    /// The chunk containing world position `position`.
    pub fn chunk_at_position(&self, position: Point3<f32>) -> Option<&Chunk> {
        self.chunks.get(&ChunkKey::from_world(position)?)
    }

    /// The chunk adjacent to `key` on `side`. Never creates.
    pub fn neighbor(&self, key: ChunkKey, side: BlockSide) -> Option<&Chunk> {
        self.chunks.get(&key.neighbor(side)?)
    }

    /// All six neighbors of `key`, indexed by `BlockSide as usize`.
    pub fn neighbors(&self, key: ChunkKey) -> Neighbors<'_> {
        BlockSide::all().map(|side| self.neighbor(key, side))
    }

    /// The block at world position `position`, if its chunk exists.
    pub fn block_at(&self, position: Point3<f32>) -> Option<Block> {
        self.chunk_at_position(position)?
            .block_at(world_to_local_block(position))
    }

    fn mark_neighbor_for_geometry(&mut self, key: ChunkKey, side: BlockSide) {
        if let Some(neighbor) = key
            .neighbor(side)
            .and_then(|neighbor| self.chunks.get_mut(&neighbor))
        {
            neighbor.mark_for_geometry_calculation();
        }
    }

    /// Generates block data for the chunk at `key`.
    ///
    /// On success every present neighbor is marked for geometry recalculation, since new
    /// blocks can hide or expose faces on their side of the border, and a `ChunkLoaded`
    /// event is published.
    pub fn load_chunk(
        &mut self,
        key: ChunkKey,
        generator: &dyn ChunkGenerator,
        events: &EventBus,
    ) -> Result<(), GenerationError> {
        let Some(chunk) = self.chunks.get_mut(&key) else {
            return Err(GenerationError::Failed {
                key,
                message: "chunk does not exist".to_string(),
            });
        };
        chunk.load(generator)?;

        for side in BlockSide::all() {
            self.mark_neighbor_for_geometry(key, side);
        }
        events.publish(WorldEvent::ChunkLoaded { key });
        Ok(())
    }

    /// Builds and stores geometry for the chunk at `key`, returning the new mesh.
    pub fn calculate_geometry(
        &mut self,
        key: ChunkKey,
        sunlight_level: u8,
    ) -> Result<Arc<ChunkMesh>, GeometryError> {
        let chunk = self
            .chunks
            .get(&key)
            .ok_or(GeometryError::MissingChunk { key })?;
        let mesh = chunk.build_geometry(&self.neighbors(key), sunlight_level)?;

        let chunk = self
            .chunks
            .get_mut(&key)
            .ok_or(GeometryError::MissingChunk { key })?;
        Ok(chunk.apply_geometry(mesh))
    }

    /// Turns the block at world position `position` into air.
    ///
    /// Returns `false` when the chunk does not exist or is not loaded yet. Neighbors
    /// sharing a face with the removed block get their geometry invalidated as well.
    pub fn remove_block_at(&mut self, position: Point3<f32>) -> bool {
        let Some(key) = ChunkKey::from_world(position) else {
            return false;
        };
        let local = world_to_local_block(position);

        match self.chunks.get_mut(&key) {
            Some(chunk) if chunk.is_loaded() => {
                chunk.remove_block(local);
            }
            _ => return false,
        }

        let border_sides = [
            (local.x == 0, BlockSide::Front),
            (local.x == CHUNK_SIZE_X - 1, BlockSide::Back),
            (local.y == 0, BlockSide::Bottom),
            (local.y == CHUNK_SIZE_Y - 1, BlockSide::Top),
            (local.z == 0, BlockSide::Left),
            (local.z == CHUNK_SIZE_Z - 1, BlockSide::Right),
        ];
        for (on_border, side) in border_sides {
            if on_border {
                self.mark_neighbor_for_geometry(key, side);
            }
        }
        true
    }

    /// Requests a geometry rebuild of every chunk.
    pub fn mark_all_for_geometry_calculation(&mut self) {
        for chunk in self.chunks.values_mut() {
            chunk.mark_for_geometry_calculation();
        }
    }

    /// Erases every chunk marked for deletion, returning their keys and last distances.
    pub fn sweep_marked(&mut self) -> Vec<(ChunkKey, i32)> {
        let mut removed = Vec::new();
        self.chunks.retain(|key, chunk| {
            if chunk.is_marked_for_deletion() {
                removed.push((*key, chunk.distance()));
                false
            } else {
                true
            }
        });
        removed
    }

    /// Number of chunks with up to date geometry.
    pub fn count_active(&self) -> usize {
        self.chunks.values().filter(|chunk| chunk.is_active()).count()
    }
}
