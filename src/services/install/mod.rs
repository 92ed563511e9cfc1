//! Multi-stage, cancellable installation of cached archives into the
//! mod library.

pub mod archive_name;
pub mod extract;
pub mod pipeline;
pub mod session;

#[cfg(test)]
#[path = "tests/archive_name_tests.rs"]
mod archive_name_tests;

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod pipeline_tests;

pub use pipeline::{run_install, InstallOutcome, InstallRequest};
pub use session::{InstallSession, InstallState};
