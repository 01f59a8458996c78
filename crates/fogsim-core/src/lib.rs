//! fogsim Core - Shared types and traits
//!
//! This crate defines the core abstractions used across:
//! - fogsim-engine (placement engine + `fogsim` binary)
//! - mobility/trace feeds that drive the engine
//!
//! Key types:
//! - MobilityFeed trait (interface for position/task sources)
//! - Node identity, tiers and planar geometry
//! - Error types

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
