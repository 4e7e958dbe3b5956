//! # Block Type Module
//!
//! This module defines the closed set of block types in the voxel world, their display
//! names and the opacity used for face culling.

use std::fmt;

use num_derive::FromPrimitive;

use super::BlockTypeSize;

/// Enumerates all possible block types in the voxel world.
///
/// The `FromPrimitive` derive allows conversion from the compact integer stored in a
/// `Block`. Any value outside the enumeration decodes to `BlockType::None`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Non-solid and transparent.
    Air,
    Stone,
    Dirt,
    Sand,
    Coal,
    /// A light source; does not hide the faces behind it.
    Torch,
    Wood,
    /// Tree leaves; see-through, so faces behind them stay visible.
    Leaves,
    Water,
    /// Invalid or unknown block.
    None,
}

impl BlockType {
    /// Converts a stored `BlockTypeSize` back to a `BlockType`.
    ///
    /// Unknown values map to `BlockType::None`.
    pub fn get_block_type_from_int(btype: BlockTypeSize) -> Self {
        num_traits::FromPrimitive::from_u8(btype).unwrap_or(BlockType::None)
    }

    /// Whether this block hides the faces of blocks adjacent to it.
    pub fn is_opaque(self) -> bool {
        matches!(
            self,
            BlockType::Stone | BlockType::Dirt | BlockType::Sand | BlockType::Coal | BlockType::Wood
        )
    }

    /// Whether this block produces geometry of its own.
    pub fn is_visible(self) -> bool {
        !matches!(self, BlockType::Air | BlockType::None)
    }

    /// Human readable name of the block type.
    pub fn name(self) -> &'static str {
        match self {
            BlockType::Air => "air",
            BlockType::Stone => "stone",
            BlockType::Dirt => "dirt",
            BlockType::Sand => "sand",
            BlockType::Coal => "coal",
            BlockType::Torch => "torch",
            BlockType::Wood => "wood",
            BlockType::Leaves => "leaves",
            BlockType::Water => "water",
            BlockType::None => "none",
        }
    }

    /// Picks a random solid terrain block using the given generator.
    ///
    /// Used by the noise generator to vary terrain material.
    pub fn get_random_terrain_type(rng: &mut fastrand::Rng) -> Self {
        match rng.u8(0..10) {
            0 => BlockType::Coal,
            1..=2 => BlockType::Sand,
            3..=5 => BlockType::Dirt,
            _ => BlockType::Stone,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
