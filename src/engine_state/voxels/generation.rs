//! # Generation Collaborators
//!
//! The world streaming core does not know how terrain looks. It asks a
//! `ChunkGenerator` to fill a chunk's block storage when the chunk loads, and lets
//! registered `WorldSubsystem`s (lighting, vegetation, ...) touch the chunk store once
//! per background pass.
//!
//! Three generators ship with the crate: 3D Perlin noise terrain, flat ground and
//! empty space.

use std::sync::Arc;

use noise::{NoiseFn, Perlin};

use crate::{config::GeneratorConfig, error::GenerationError};

use super::{
    block::block_type::BlockType,
    chunk::BlockStorage,
    chunk_store::ChunkStore,
    spatial::{ChunkKey, CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z},
};

/// Produces block data for a chunk.
///
/// Called from the background pass, synchronously, once per chunk load. An error (or a
/// panic) leaves the chunk unloaded and it is retried on the next pass.
pub trait ChunkGenerator: Send + Sync {
    /// Fills `blocks` for the chunk identified by `key`. `blocks` starts as all air.
    fn generate(&self, key: ChunkKey, blocks: &mut BlockStorage) -> Result<(), GenerationError>;
}

/// A subsystem processed at the start of every background pass, under the world lock.
pub trait WorldSubsystem: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Runs one step over the chunk store.
    fn process(&mut self, chunks: &mut ChunkStore);
}

/// Builds the generator described by a configuration entry.
pub fn generator_from_config(config: &GeneratorConfig) -> Arc<dyn ChunkGenerator> {
    match *config {
        GeneratorConfig::Perlin { seed } => Arc::new(PerlinGenerator::new(seed)),
        GeneratorConfig::Flat { ground_level } => Arc::new(FlatGenerator { ground_level }),
        GeneratorConfig::Empty => Arc::new(EmptyGenerator),
    }
}

/// Threshold above which Perlin noise is considered solid for terrain generation.
pub const PERLIN_POSITIVE_THRESHOLD: f64 = 0.2;
/// Threshold below which Perlin noise is considered solid for terrain generation.
pub const PERLIN_NEGATIVE_THRESHOLD: f64 = -0.2;
/// Scaling factor applied to world coordinates when sampling Perlin noise.
pub const PERLIN_SCALE_FACTOR: f64 = 0.02;

/// Generates terrain by sampling 3D Perlin noise and thresholding it.
///
/// The result resembles natural terrain with caves and overhangs. Materials are picked
/// with a random generator seeded from the chunk key, so the same chunk always comes out
/// the same.
pub struct PerlinGenerator {
    perlin: Perlin,
    seed: u32,
}

impl PerlinGenerator {
    /// Creates a generator for the given world seed.
    pub fn new(seed: u32) -> Self {
        PerlinGenerator {
            perlin: Perlin::new(seed),
            seed,
        }
    }

    fn to_perlin_pos(x: i64, y: i64, z: i64) -> [f64; 3] {
        [
            x as f64 * PERLIN_SCALE_FACTOR,
            y as f64 * PERLIN_SCALE_FACTOR,
            z as f64 * PERLIN_SCALE_FACTOR,
        ]
    }

    fn chunk_seed(&self, key: ChunkKey) -> u64 {
        let mut seed = self.seed as u64;
        for component in [key.0.x, key.0.y, key.0.z] {
            seed = seed
                .wrapping_mul(0x9E37_79B9_7F4A_7C15)
                .wrapping_add(component as u64);
        }
        seed
    }
}

impl ChunkGenerator for PerlinGenerator {
    fn generate(&self, key: ChunkKey, blocks: &mut BlockStorage) -> Result<(), GenerationError> {
        let mut rng = fastrand::Rng::with_seed(self.chunk_seed(key));

        for k in 0..CHUNK_SIZE_Z {
            for j in 0..CHUNK_SIZE_Y {
                for i in 0..CHUNK_SIZE_X {
                    let sample = self.perlin.get(Self::to_perlin_pos(
                        key.0.x + i64::from(i),
                        key.0.y + i64::from(j),
                        key.0.z + i64::from(k),
                    ));
                    if !(PERLIN_NEGATIVE_THRESHOLD..=PERLIN_POSITIVE_THRESHOLD).contains(&sample) {
                        blocks.set(
                            cgmath::Point3::new(i, j, k),
                            BlockType::get_random_terrain_type(&mut rng),
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

/// Stone below `ground_level - 3`, dirt up to `ground_level`, air above.
pub struct FlatGenerator {
    /// First world y that is air.
    pub ground_level: i32,
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&self, key: ChunkKey, blocks: &mut BlockStorage) -> Result<(), GenerationError> {
        for j in 0..CHUNK_SIZE_Y {
            let world_y = key.0.y + i64::from(j);
            let ground_level = i64::from(self.ground_level);
            if world_y >= ground_level {
                continue;
            }
            let block_type = if world_y >= ground_level - 3 {
                BlockType::Dirt
            } else {
                BlockType::Stone
            };
            for k in 0..CHUNK_SIZE_Z {
                for i in 0..CHUNK_SIZE_X {
                    blocks.set(cgmath::Point3::new(i, j, k), block_type);
                }
            }
        }
        Ok(())
    }
}

/// Leaves every chunk empty.
pub struct EmptyGenerator;

impl ChunkGenerator for EmptyGenerator {
    fn generate(&self, _key: ChunkKey, _blocks: &mut BlockStorage) -> Result<(), GenerationError> {
        Ok(())
    }
}
