//! # Voxel Task System
//!
//! Background work of a world. The chunk-state pass is published at most once at a
//! time per world and runs on a worker thread of the `TaskManager`.

pub mod chunk_state_update_task;

pub use chunk_state_update_task::{update_chunk_state, ChunkStateReport, ChunkStateUpdateTask};
