//! Queue engine orchestration

pub mod core;

pub use core::{EngineStats, QueueEngine};
