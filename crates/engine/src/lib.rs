//! Fateweaver engine: session store, managers, and the quantum-branching
//! turn pipeline.
//!
//! The engine anticipates player actions, pre-generates outcome branches in
//! the background while the player reads, matches real input against the
//! cache, rolls dice at observation time to collapse a branch, and applies
//! validated state deltas atomically to the session's world model.

pub mod app;
pub mod config;
pub mod infrastructure;
pub mod managers;
pub mod pipeline;
pub mod scene;
pub mod store;

#[cfg(test)]
pub mod test_support;

pub use app::{init_tracing, Engine, EngineBuilder};
pub use config::EngineConfig;
pub use store::Store;
