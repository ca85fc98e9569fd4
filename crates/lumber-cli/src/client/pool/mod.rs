//! Bounded fan-out of write work across a fixed set of workers.
//!
//! - [`manager`] - splits the work, spawns workers, collects completions.
//! - [`worker`] - the per-worker write loop.

pub mod manager;
pub mod worker;
