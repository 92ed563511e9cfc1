pub mod cancel;
pub mod resource_lock;

#[cfg(test)]
#[path = "tests/cancel_tests.rs"]
mod cancel_tests;

#[cfg(test)]
#[path = "tests/resource_lock_tests.rs"]
mod resource_lock_tests;
