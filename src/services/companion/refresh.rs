//! Refresh dispatch: find the game, focus it, pulse the reload hotkey.

use std::time::Duration;

use sysinfo::System;

/// Settle time before and after the hotkey pulse, so the game window is
/// focused when the keys arrive and has consumed them before we return.
pub const SETTLE: Duration = Duration::from_millis(100);

/// Platform keystroke/window seam. The real implementation talks to the
/// OS; tests record calls instead.
pub trait KeyPulser: Send + Sync {
    /// Bring the window of the given process to the foreground.
    fn focus(&self, pid: u32) -> std::io::Result<()>;
    /// Press and release the fixed refresh hotkey.
    fn pulse(&self) -> std::io::Result<()>;
}

/// Process table seam; tests return canned pid lists.
pub trait ProcessFinder: Send + Sync {
    /// Pids of all processes whose name matches case-insensitively.
    fn pids_by_name(&self, process_name: &str) -> Vec<u32>;
}

/// Looks the process up in the live system table.
pub struct SystemProcessFinder;

impl ProcessFinder for SystemProcessFinder {
    fn pids_by_name(&self, process_name: &str) -> Vec<u32> {
        let mut sys = System::new();
        sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

        sys.processes()
            .values()
            .filter(|p| p.name().to_string_lossy().eq_ignore_ascii_case(process_name))
            .map(|p| p.pid().as_u32())
            .collect()
    }
}

/// Dispatch target for the refresh command.
pub trait Refresher: Send + Sync {
    fn refresh(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// Refreshes the single running game process by name.
pub struct GameRefresher<P: KeyPulser, F: ProcessFinder = SystemProcessFinder> {
    process_name: String,
    pulser: P,
    finder: F,
}

impl<P: KeyPulser> GameRefresher<P> {
    pub fn new(process_name: impl Into<String>, pulser: P) -> Self {
        Self::with_finder(process_name, pulser, SystemProcessFinder)
    }
}

impl<P: KeyPulser, F: ProcessFinder> GameRefresher<P, F> {
    pub fn with_finder(process_name: impl Into<String>, pulser: P, finder: F) -> Self {
        Self {
            process_name: process_name.into(),
            pulser,
            finder,
        }
    }

    /// Pid of the game process, but only when exactly one match exists.
    /// Zero matches means the game is not running; several mean we
    /// cannot tell which window to drive.
    fn find_single_process(&self) -> Option<u32> {
        let pids = self.finder.pids_by_name(&self.process_name);

        match pids.as_slice() {
            [pid] => Some(*pid),
            [] => {
                log::error!(
                    "[Companion] No '{}' process running, refresh skipped",
                    self.process_name
                );
                None
            }
            _ => {
                log::error!(
                    "[Companion] Multiple '{}' processes running, refusing to refresh",
                    self.process_name
                );
                None
            }
        }
    }
}

impl<P: KeyPulser, F: ProcessFinder> Refresher for GameRefresher<P, F> {
    async fn refresh(&self) {
        let Some(pid) = self.find_single_process() else {
            return;
        };

        if let Err(e) = self.pulser.focus(pid) {
            log::error!("[Companion] Failed to focus game window: {e}");
            return;
        }
        tokio::time::sleep(SETTLE).await;
        if let Err(e) = self.pulser.pulse() {
            log::error!("[Companion] Failed to send refresh hotkey: {e}");
            return;
        }
        tokio::time::sleep(SETTLE).await;
        log::info!("[Companion] Refresh pulse sent to pid {pid}");
    }
}
