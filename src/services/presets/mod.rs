//! Preset snapshots of the enabled mod set.

pub mod store;
pub mod types;

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;

pub use store::PresetStore;
pub use types::{ApplyPresetResult, Preset, PresetEntry};
