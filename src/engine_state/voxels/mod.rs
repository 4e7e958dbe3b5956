//! # Voxel World Streaming
//!
//! This module contains the voxel data model and the machinery that streams it around
//! moving observers.
//!
//! ## Architecture
//!
//! * **Spatial**: Maps world positions to chunk origins, keys and local block positions
//! * **Block**: Defines individual voxel types and block sides
//! * **Chunk**: Fixed-size 3D arrays of blocks with their lifecycle state and geometry
//! * **Chunk store**: The arena owning a world's chunks, with neighbor lookup by key
//! * **Frontier**: Breadth-first search deciding which chunks should exist
//! * **World**: Coordinates reconciliation, background passes, block edits and rendering
//! * **Tasks**: The background chunk-state pass
//! * **Events**: Notifications to renderers and tooling
//!
//! ## Data Flow
//!
//! 1. Observers move
//! 2. The frontier computes the desired set of chunks
//! 3. The world creates missing chunks and erases unwanted ones
//! 4. A background pass loads new chunks and rebuilds stale geometry
//! 5. Fresh geometry is handed to the renderer a few chunks per tick

pub mod block;
pub mod chunk;
pub mod chunk_store;
pub mod events;
pub mod frontier;
pub mod generation;
pub mod observer;
pub mod spatial;
pub mod tasks;
pub mod world;
