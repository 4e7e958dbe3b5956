//! # Block Module
//!
//! This module provides the core block-related types: the block cell itself, its type
//! and the six faces of a block.

use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The underlying integer type used to represent block types in memory.
pub type BlockTypeSize = u8;

/// Represents a single voxel block in the world.
///
/// This is a lightweight structure that stores only the block type. Properties such as
/// opacity are looked up from the type.
///
/// # Memory Layout
/// The `#[repr(C)]` attribute ensures a consistent memory layout so block storage can be
/// handed to a renderer or written to disk as raw bytes.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq, Eq)]
pub struct Block {
    /// The type of this block, encoded as a `BlockTypeSize` for compact storage.
    pub block_type: BlockTypeSize,
}

impl Block {
    /// An air block.
    pub const AIR: Block = Block {
        block_type: BlockType::Air as BlockTypeSize,
    };

    /// Creates a new block of the specified type.
    pub fn new(block_type: BlockType) -> Self {
        Block {
            block_type: block_type as BlockTypeSize,
        }
    }

    /// The decoded type of this block.
    pub fn get_type(&self) -> BlockType {
        BlockType::get_block_type_from_int(self.block_type)
    }
}

impl Default for Block {
    fn default() -> Self {
        Block::AIR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_block_is_air() {
        let block: Block = bytemuck::Zeroable::zeroed();
        assert_eq!(block, Block::AIR);
        assert_eq!(Block::new(BlockType::Coal).get_type(), BlockType::Coal);
    }
}
