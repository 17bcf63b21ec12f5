//! Ember Core - Foundational types for the Ember particle engine
//!
//! This crate provides the types that all other Ember crates depend on:
//! - `Vec3`, `Color` - Spatial and color types with interpolation
//! - `SpawnTransform` - World-space position/orientation of an emitter
//! - `ContentHash` - SHA-256 digests of render snapshots
//! - Error types and Result alias

mod error;
mod hash;
mod types;

pub use error::{EmberError, Result};
pub use hash::{ContentHash, ContentHasher};
pub use types::{Color, SpawnTransform, Vec3};
