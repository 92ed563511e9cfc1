//! Per-install session state, observable through a watch channel.

use serde::Serialize;
use tokio::sync::watch;

/// Lifecycle of one installation. `Installed`, `Canceled` and `Error` are
/// terminal; a session never leaves a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail")]
pub enum InstallState {
    Idle,
    Extracting,
    Staged,
    Installing,
    Installed,
    Canceled,
    Error(String),
}

impl InstallState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstallState::Installed | InstallState::Canceled | InstallState::Error(_)
        )
    }
}

pub struct InstallSession {
    tx: watch::Sender<InstallState>,
}

impl InstallSession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(InstallState::Idle);
        Self { tx }
    }

    /// Observe state transitions; the receiver always sees the latest
    /// state even if it missed intermediate ones.
    pub fn subscribe(&self) -> watch::Receiver<InstallState> {
        self.tx.subscribe()
    }

    pub fn state(&self) -> InstallState {
        self.tx.borrow().clone()
    }

    pub(super) fn set(&self, state: InstallState) {
        if self.tx.borrow().is_terminal() {
            return;
        }
        log::debug!("[Install] {:?} -> {:?}", *self.tx.borrow(), state);
        let _ = self.tx.send(state);
    }
}

impl Default for InstallSession {
    fn default() -> Self {
        Self::new()
    }
}
