//! # World Events
//!
//! Typed notifications from a world to any number of listeners (renderers, UI,
//! tooling). Each `subscribe()` call returns its own receiver; every event is cloned to
//! every live receiver, and receivers that have been dropped are forgotten on the next
//! publish.
//!
//! Events may be published from the background pass as well as from the owning thread.

use std::sync::{
    mpsc::{channel, Receiver, Sender},
    Arc, Mutex, PoisonError,
};

use super::{chunk::mesh::ChunkMesh, spatial::ChunkKey, tasks::ChunkStateReport};

/// Something observable happened to a world.
#[derive(Debug, Clone)]
pub enum WorldEvent {
    /// A chunk finished generating its block data.
    ChunkLoaded { key: ChunkKey },
    /// A chunk's geometry was handed to the renderer.
    ChunkReady { key: ChunkKey, mesh: Arc<ChunkMesh> },
    /// A chunk left the desired set and was erased.
    ChunkRemoved { key: ChunkKey, distance: i32 },
    /// A background chunk-state pass of this world completed.
    PassCompleted { report: ChunkStateReport },
}

/// Fan-out of `WorldEvent`s to every subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<WorldEvent>>>>,
}

impl EventBus {
    /// Registers a new listener.
    pub fn subscribe(&self) -> Receiver<WorldEvent> {
        let (sender, receiver) = channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        receiver
    }

    /// Delivers `event` to every live listener.
    pub fn publish(&self, event: WorldEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Number of listeners that were alive at the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
