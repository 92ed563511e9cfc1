//! Cooperative cancellation for long-running pipelines.
//!
//! A `CancelToken` is threaded explicitly through every suspending call
//! and checked only at defined phase boundaries, never inside an atomic
//! file move.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::types::errors::{EngineError, EngineResult};

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Phase-boundary check: errors with `Canceled` once the token is set.
    pub fn checkpoint(&self) -> EngineResult<()> {
        if self.is_canceled() {
            Err(EngineError::Canceled)
        } else {
            Ok(())
        }
    }
}
