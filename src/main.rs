//! # Voxel Streaming Demo
//!
//! Headless fly-over of a streamed world. The first argument, if given, is a JSON
//! configuration file; without it the defaults are used.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- world.json
//! ```

use anyhow::{Context, Result};
use voxel_streaming::config::EngineConfig;

fn main() -> Result<()> {
    voxel_streaming::init_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("loading configuration from {path}"))?,
        None => EngineConfig::default(),
    };

    voxel_streaming::run(config).context("running the fly-over")?;
    Ok(())
}
