//! # Frontier Scheduler
//!
//! Decides which chunks should exist. Starting from the chunk of every observer, a
//! breadth-first search walks the six axis-aligned chunk neighbors and records the
//! first (and therefore smallest) distance at which each chunk is reached.
//!
//! Positions without a chunk key (non-finite, or too far out) are skipped, as are
//! neighbors past the edge of the key range.

use std::collections::{HashMap, VecDeque};

use cgmath::Point3;
use log::warn;

use super::{block::block_side::BlockSide, spatial::ChunkKey};

/// Chunks that should exist, with their distance from the nearest observer.
pub type DesiredSet = HashMap<ChunkKey, i32>;

/// Computes the desired-set for observers at `positions`.
///
/// Observer chunks are always present at distance 0. A chunk at distance `d` only
/// expands to its neighbors when `d + 1 < visible_distance`, so a radius of 0 or 1
/// yields just the observer chunks.
pub fn compute_desired_chunks<I>(positions: I, visible_distance: u32) -> DesiredSet
where
    I: IntoIterator<Item = Point3<f32>>,
{
    let radius = i64::from(visible_distance);
    let mut desired = DesiredSet::new();
    let mut frontier = VecDeque::new();

    for position in positions {
        let Some(key) = ChunkKey::from_world(position) else {
            warn!("Observer at {:?} is outside the chunk grid", position);
            continue;
        };
        if desired.insert(key, 0).is_none() {
            frontier.push_back((key, 0));
        }
    }

    while let Some((key, distance)) = frontier.pop_front() {
        if i64::from(distance) + 1 >= radius {
            continue;
        }
        for neighbor in BlockSide::all().into_iter().filter_map(|side| key.neighbor(side)) {
            if !desired.contains_key(&neighbor) {
                desired.insert(neighbor, distance + 1);
                frontier.push_back((neighbor, distance + 1));
            }
        }
    }

    desired
}
