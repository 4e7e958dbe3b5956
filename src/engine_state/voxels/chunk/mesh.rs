//! Geometry derived from a chunk's block data.
//!
//! A `ChunkMesh` is the hand-off format between the chunk-state pass and whatever
//! renders chunks: one quad per visible block face, grouped by side so a renderer can
//! cull whole sides at once.

use cgmath::Point3;

use crate::engine_state::voxels::block::{block_side::BlockSide, block_type::BlockType};

/// Represents a single quad face of a voxel in the mesh.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-right,
/// upper-left) in chunk-local block coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    /// Lower-left corner of the face in chunk coordinates
    pub ll: Point3<i32>,
    /// Lower-right corner of the face in chunk coordinates
    pub lr: Point3<i32>,
    /// Upper-left corner of the face in chunk coordinates
    pub ul: Point3<i32>,
    /// Upper-right corner of the face in chunk coordinates
    pub ur: Point3<i32>,
    /// The type of the block this face belongs to
    pub block_type: BlockType,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
    /// Light level applied to the face (0-15)
    pub light: u8,
}

impl Face {
    /// Creates the face on `block_side` of the block at local `(i, j, k)`.
    pub fn new(
        i: i32,
        j: i32,
        k: i32,
        block_type: BlockType,
        block_side: BlockSide,
        light: u8,
    ) -> Self {
        let (ll, lr, ul, ur) = match block_side {
            BlockSide::Front => (
                Point3::new(i, j, k),
                Point3::new(i, j, k + 1),
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + 1),
            ),
            BlockSide::Back => (
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
                Point3::new(i + 1, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
            ),
            BlockSide::Bottom => (
                Point3::new(i, j, k + 1),
                Point3::new(i, j, k),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
            ),
            BlockSide::Top => (
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i + 1, j + 1, k + 1),
            ),
            BlockSide::Left => (
                Point3::new(i + 1, j, k),
                Point3::new(i, j, k),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i, j + 1, k),
            ),
            BlockSide::Right => (
                Point3::new(i, j, k + 1),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k + 1),
            ),
        };

        Face {
            ll,
            lr,
            ul,
            ur,
            block_type,
            block_side,
            light,
        }
    }
}

/// Complete geometry of one chunk, indexed by `BlockSide` as `usize`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChunkMesh {
    /// Faces grouped by the side they point to.
    pub sides: [Vec<Face>; 6],
}

impl ChunkMesh {
    /// Adds a face to the group of its side.
    pub fn push(&mut self, face: Face) {
        self.sides[face.block_side as usize].push(face);
    }

    /// Total number of faces across all sides.
    pub fn face_count(&self) -> usize {
        self.sides.iter().map(Vec::len).sum()
    }

    /// Whether the mesh has nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.face_count() == 0
    }

    /// Iterates over every face in side order.
    pub fn faces(&self) -> impl Iterator<Item = &Face> {
        self.sides.iter().flatten()
    }
}
