//! # Block Side Module
//!
//! This module defines the six axis-aligned faces of a voxel block. The same six
//! directions name the neighbors of a chunk.

use cgmath::Vector3;

/// Represents the six possible faces of a voxel block.
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The face pointing towards negative X
    Front = 0,

    /// The face pointing towards positive X
    Back = 1,

    /// The face pointing towards negative Y
    Bottom = 2,

    /// The face pointing towards positive Y
    Top = 3,

    /// The face pointing towards negative Z
    Left = 4,

    /// The face pointing towards positive Z
    Right = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::Front,
            BlockSide::Back,
            BlockSide::Bottom,
            BlockSide::Top,
            BlockSide::Left,
            BlockSide::Right,
        ]
    }

    /// Unit step in block (or chunk) units towards this side.
    pub fn offset(self) -> Vector3<i32> {
        match self {
            BlockSide::Front => Vector3::new(-1, 0, 0),
            BlockSide::Back => Vector3::new(1, 0, 0),
            BlockSide::Bottom => Vector3::new(0, -1, 0),
            BlockSide::Top => Vector3::new(0, 1, 0),
            BlockSide::Left => Vector3::new(0, 0, -1),
            BlockSide::Right => Vector3::new(0, 0, 1),
        }
    }

    /// The side facing the other way.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::Front => BlockSide::Back,
            BlockSide::Back => BlockSide::Front,
            BlockSide::Bottom => BlockSide::Top,
            BlockSide::Top => BlockSide::Bottom,
            BlockSide::Left => BlockSide::Right,
            BlockSide::Right => BlockSide::Left,
        }
    }
}
