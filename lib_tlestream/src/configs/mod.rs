//! # Configuration Modules
//!
//! Configuration types consumed by the engine.

/// Engine intervals, upstream URLs and datastore location.
pub mod config_engine;

pub use config_engine::EngineConfig;
