pub mod config;
pub mod engine;
pub mod services;
pub mod types;

/// Standard prefix for disabled mod folders. Shared across the library
/// and preset services.
pub const DISABLED_PREFIX: &str = "DISABLED ";

pub use config::EngineConfig;
pub use engine::Engine;
pub use types::errors::{EngineError, EngineResult};
