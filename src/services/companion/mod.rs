//! Companion process plumbing: the per-user refresh channel and the
//! in-game refresh dispatch.

pub mod protocol;
pub mod refresh;
pub mod server;

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod protocol_tests;

pub use refresh::{GameRefresher, KeyPulser, ProcessFinder, Refresher, SystemProcessFinder};
