//! # Errors
//!
//! Error types for every fallible operation in the crate. None of them is fatal to the
//! tick loop: generation and geometry failures are per chunk, command failures leave the
//! world untouched, and task failures only release the in-flight marker.

use std::{io, path::PathBuf};

use crate::engine_state::voxels::spatial::ChunkKey;

/// Failure of a `ChunkGenerator` to produce block data for a chunk.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The generator refused or failed to fill the chunk.
    #[error("generator failed for chunk {key}: {message}")]
    Failed { key: ChunkKey, message: String },

    /// The generator panicked while filling the chunk.
    #[error("generator panicked for chunk {key}")]
    Panicked { key: ChunkKey },
}

/// Failure to derive geometry for a chunk.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// Geometry can only be built from loaded block data.
    #[error("chunk {key} is not loaded")]
    NotLoaded { key: ChunkKey },

    /// The chunk disappeared from the store before its geometry was built.
    #[error("chunk {key} does not exist")]
    MissingChunk { key: ChunkKey },
}

/// Rejected console command. The world is never modified when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command '{name}'")]
    UnknownCommand { name: String },

    #[error("command '{name}' expects {expected} argument(s), got {got}")]
    WrongArgumentCount {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid argument '{value}' for command '{name}': {reason}")]
    InvalidArgument {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to clear storage directory {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to read or parse a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a background task.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task panicked; the worker thread caught the panic and stayed alive.
    #[error("task panicked: {message}")]
    Panicked { message: String },
}

/// Failure to bring up the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
