//! # Configuration
//!
//! Engine and world settings, read from JSON. Every field has a default, so an empty
//! object (or no file at all) yields a working configuration.
//!
//! ```json
//! {
//!     "worker_threads": 1,
//!     "world": {
//!         "visible_distance": 4,
//!         "update_interval_ms": 1000,
//!         "render_limit": 4,
//!         "sunlight_level": 15,
//!         "storage_dir": "World",
//!         "generator": { "kind": "perlin", "seed": 0 }
//!     }
//! }
//! ```

use std::{fs, path::Path, path::PathBuf};

use serde::Deserialize;
use web_time::Duration;

use crate::error::ConfigError;

/// Highest sunlight level accepted by a world.
pub const MAX_SUNLIGHT_LEVEL: u8 = 15;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of worker threads backing the task manager.
    pub worker_threads: usize,
    /// Settings applied to every world the engine creates.
    pub world: WorldConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            world: WorldConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }
}

/// Per-world streaming settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Visibility radius in chunks; exclusive upper bound on frontier distance.
    pub visible_distance: u32,
    /// Minimum time between two reconciliation passes.
    pub update_interval_ms: u64,
    /// Maximum number of chunks handed to the renderer per tick.
    pub render_limit: usize,
    /// Initial global sunlight level (0-15).
    pub sunlight_level: u8,
    /// Directory holding persisted chunk files, cleared by `world_reset`.
    pub storage_dir: PathBuf,
    /// Terrain generator used to fill newly loaded chunks.
    pub generator: GeneratorConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            visible_distance: 4,
            update_interval_ms: 1000,
            render_limit: 4,
            sunlight_level: MAX_SUNLIGHT_LEVEL,
            storage_dir: PathBuf::from("World"),
            generator: GeneratorConfig::default(),
        }
    }
}

impl WorldConfig {
    /// The reconciliation gate as a `Duration`.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }
}

/// Which built-in generator a world uses.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorConfig {
    /// 3D Perlin noise terrain with caves and overhangs.
    Perlin { seed: u32 },
    /// Solid ground below `ground_level` (world y), air above.
    Flat { ground_level: i32 },
    /// Nothing but air.
    Empty,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig::Perlin { seed: 0 }
    }
}
