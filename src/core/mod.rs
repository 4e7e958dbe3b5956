//! # Core Module
//!
//! Concurrency primitives shared by the rest of the crate.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking. A
//!   world keeps its chunk store inside one of these, and the same lock is taken by the
//!   background chunk-state pass and by the main-thread sweep.

pub mod mt_resource;

pub use mt_resource::MtResource;
