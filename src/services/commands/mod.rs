//! User-defined external commands: definitions, launch, tracking.

pub mod orchestrator;
pub mod store;
pub mod types;

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod orchestrator_tests;

pub use orchestrator::CommandOrchestrator;
pub use store::CommandStore;
pub use types::{
    CommandDefinition, CommandDefinitionUpdate, CommandEvent, RunningCommand,
    TARGET_PATH_PLACEHOLDER,
};
