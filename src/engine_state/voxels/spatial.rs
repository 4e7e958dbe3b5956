//! # Spatial Index
//!
//! Conversions between continuous world positions, chunk origins, chunk keys and
//! chunk-local block coordinates.
//!
//! A chunk covers `CHUNK_SIZE_X × CHUNK_SIZE_Y × CHUNK_SIZE_Z` blocks, one block per
//! world unit. Its origin is the world position of its lowest corner, always a multiple
//! of the chunk size on each axis, and its key is that origin as an `i64` triple.
//!
//! Every finite snapped origin below 2^63 in magnitude converts exactly. Positions
//! outside that range, and non-finite ones, have no key.

use std::fmt;

use cgmath::{Point3, Vector3};

use super::block::block_side::BlockSide;

/// Chunk width in blocks (X axis).
pub const CHUNK_SIZE_X: i32 = 16;
/// Chunk height in blocks (Y axis).
pub const CHUNK_SIZE_Y: i32 = 16;
/// Chunk depth in blocks (Z axis).
pub const CHUNK_SIZE_Z: i32 = 16;
/// Number of blocks in a chunk.
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE_X * CHUNK_SIZE_Y * CHUNK_SIZE_Z) as usize;

/// Chunk dimensions as a vector, in blocks.
pub fn chunk_size_vector() -> Vector3<i32> {
    Vector3::new(CHUNK_SIZE_X, CHUNK_SIZE_Y, CHUNK_SIZE_Z)
}

/// Identity of a chunk: its origin as an integer triple.
///
/// Displayed as `x_y_z`, e.g. `-16_0_32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey(pub Point3<i64>);

impl ChunkKey {
    /// Key of the chunk whose origin is `(x, y, z)`; the caller provides snapped values.
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        ChunkKey(Point3::new(x, y, z))
    }

    /// Key of the chunk containing the world position `position`, if it has one.
    pub fn from_world(position: Point3<f32>) -> Option<Self> {
        chunk_key(world_to_chunk_origin(position))
    }

    /// The chunk origin in world space.
    pub fn origin(&self) -> Point3<f32> {
        Point3::new(self.0.x as f32, self.0.y as f32, self.0.z as f32)
    }

    /// Key of the adjacent chunk on `side`, or `None` at the edge of the key range.
    pub fn neighbor(&self, side: BlockSide) -> Option<ChunkKey> {
        let step = side.offset();
        let size = chunk_size_vector();
        let axis = |value: i64, step: i32, size: i32| value.checked_add(i64::from(step * size));
        Some(ChunkKey::new(
            axis(self.0.x, step.x, size.x)?,
            axis(self.0.y, step.y, size.y)?,
            axis(self.0.z, step.z, size.z)?,
        ))
    }

    /// Number of chunk steps along the axes between two chunks.
    pub fn chunk_distance(&self, other: &ChunkKey) -> u64 {
        let steps = |a: i64, b: i64, size: i32| a.abs_diff(b) / size as u64;
        steps(self.0.x, other.0.x, CHUNK_SIZE_X)
            .saturating_add(steps(self.0.y, other.0.y, CHUNK_SIZE_Y))
            .saturating_add(steps(self.0.z, other.0.z, CHUNK_SIZE_Z))
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.0.x, self.0.y, self.0.z)
    }
}

fn snap(value: f32, size: i32) -> f32 {
    // f64 keeps `value / size` exact for every f32 input.
    ((value as f64 / size as f64).floor() * size as f64) as f32
}

/// Snaps a world position to the origin of the chunk containing it.
pub fn world_to_chunk_origin(position: Point3<f32>) -> Point3<f32> {
    Point3::new(
        snap(position.x, CHUNK_SIZE_X),
        snap(position.y, CHUNK_SIZE_Y),
        snap(position.z, CHUNK_SIZE_Z),
    )
}

/// Position of the block containing `position`, relative to its chunk origin.
///
/// Every component lies in `[0, size)` for its axis.
pub fn world_to_local_block(position: Point3<f32>) -> Point3<i32> {
    let origin = world_to_chunk_origin(position);
    let local = |value: f32, origin: f32, size: i32| {
        ((value as f64 - origin as f64).floor() as i32).clamp(0, size - 1)
    };
    Point3::new(
        local(position.x, origin.x, CHUNK_SIZE_X),
        local(position.y, origin.y, CHUNK_SIZE_Y),
        local(position.z, origin.z, CHUNK_SIZE_Z),
    )
}

fn key_component(value: f32) -> Option<i64> {
    let value = f64::from(value);
    // -2^63 and 2^63 are exact in f64; everything strictly between fits an i64.
    let limit = 2f64.powi(63);
    (value.is_finite() && value >= -limit && value < limit).then(|| value as i64)
}

/// Key of the chunk at `origin`, by truncating each component.
///
/// `None` when a component is not finite or does not fit an `i64`.
pub fn chunk_key(origin: Point3<f32>) -> Option<ChunkKey> {
    Some(ChunkKey::new(
        key_component(origin.x)?,
        key_component(origin.y)?,
        key_component(origin.z)?,
    ))
}

/// Whether a local block position lies inside a chunk.
pub fn is_local_in_bounds(local: Point3<i32>) -> bool {
    (0..CHUNK_SIZE_X).contains(&local.x)
        && (0..CHUNK_SIZE_Y).contains(&local.y)
        && (0..CHUNK_SIZE_Z).contains(&local.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_positions() -> Vec<Point3<f32>> {
        let values = [
            -1000.25, -33.0, -16.0, -15.999, -1.0, -0.0001, 0.0, 0.5, 15.999, 16.0, 17.3, 255.9,
            4096.0,
        ];
        let mut positions = Vec::new();
        for &x in &values {
            for &y in &values {
                for &z in &[values[0], values[5], values[7], values[10]] {
                    positions.push(Point3::new(x, y, z));
                }
            }
        }
        positions
    }

    #[test]
    fn snapping_is_idempotent() {
        for position in sample_positions() {
            let origin = world_to_chunk_origin(position);
            assert_eq!(world_to_chunk_origin(origin), origin, "position {position:?}");
        }
    }

    #[test]
    fn local_block_is_inside_the_chunk() {
        for position in sample_positions() {
            let local = world_to_local_block(position);
            assert!(is_local_in_bounds(local), "{position:?} -> {local:?}");
        }
    }

    #[test]
    fn snapping_floors_negative_coordinates() {
        assert_eq!(
            world_to_chunk_origin(Point3::new(-0.5, 15.9, 16.0)),
            Point3::new(-16.0, 0.0, 16.0)
        );
        assert_eq!(
            world_to_local_block(Point3::new(-0.5, 15.9, 16.0)),
            Point3::new(15, 15, 0)
        );
    }

    #[test]
    fn keys_are_equal_iff_origins_are_equal() {
        let key = |x, y, z| ChunkKey::from_world(Point3::new(x, y, z)).unwrap();
        let a = key(1.0, 2.0, 3.0);
        let b = key(15.5, 0.0, 9.0);
        let c = key(16.0, 0.0, 9.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.to_string(), "16_0_0");
        assert_eq!(key(-1.0, -17.0, 0.0).to_string(), "-16_-32_0");
    }

    #[test]
    fn far_away_origins_keep_distinct_exact_keys() {
        let key = |x| ChunkKey::from_world(Point3::new(x, 0.0, 0.0)).unwrap();
        let three = key(3.0e9);
        let four = key(4.0e9);

        assert_ne!(three, four);
        assert_eq!(three.0.x, 3_000_000_000);
        assert_eq!(four.0.x, 4_000_000_000);
        assert_eq!(three.0.x % i64::from(CHUNK_SIZE_X), 0);
        assert_eq!(key(-1.0e18).0.x, -1.0e18_f32 as i64);
        assert_eq!(chunk_key(three.origin()), Some(three));
    }

    #[test]
    fn unkeyable_positions_have_no_key() {
        for x in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 1.0e19, -1.0e30, f32::MAX] {
            assert_eq!(ChunkKey::from_world(Point3::new(x, 0.0, 0.0)), None, "{x}");
        }
    }

    #[test]
    fn neighbor_stops_at_the_edge_of_the_key_range() {
        let edge = ChunkKey::new(i64::MAX - 7, 0, 0);
        assert_eq!(edge.neighbor(BlockSide::Back), None);
        assert!(edge.neighbor(BlockSide::Front).is_some());
        assert!(edge.neighbor(BlockSide::Top).is_some());
        assert_eq!(ChunkKey::new(0, i64::MIN, 0).neighbor(BlockSide::Bottom), None);
    }

    #[test]
    fn neighbor_keys_step_one_chunk() {
        let key = ChunkKey::new(0, 16, -32);
        assert_eq!(key.neighbor(BlockSide::Front), Some(ChunkKey::new(-16, 16, -32)));
        assert_eq!(key.neighbor(BlockSide::Top), Some(ChunkKey::new(0, 32, -32)));
        assert_eq!(key.neighbor(BlockSide::Right), Some(ChunkKey::new(0, 16, -16)));
        for side in BlockSide::all() {
            let neighbor = key.neighbor(side).unwrap();
            assert_eq!(neighbor.neighbor(side.opposite()), Some(key));
            assert_eq!(key.chunk_distance(&neighbor), 1);
        }
        assert_eq!(chunk_key(key.origin()), Some(key));
    }
}
