//! Ember Runtime - Tick loop infrastructure
//!
//! Provides the building blocks that drive the particle engine:
//! - `GameClock` — wall-clock or manually stepped time source
//! - `TickInput` — per-tick inputs passed explicitly to systems
//! - `RuntimeSystem` — trait for systems ticked by the loop

mod clock;
mod system;

pub use clock::GameClock;
pub use system::{RuntimeSystem, TickInput};
