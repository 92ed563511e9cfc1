//! Launching, tracking and terminating external commands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use super::store::CommandStore;
use super::types::{resolve_arguments, CommandEvent, RunningCommand};
use crate::types::errors::{EngineError, EngineResult};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct RunEntry {
    info: RunningCommand,
    kill_on_exit: bool,
    kill_tx: mpsc::Sender<()>,
}

/// Tracks every live run and broadcasts changes to the running set.
/// Concurrent runs of one definition are always allowed.
pub struct CommandOrchestrator {
    store: Arc<CommandStore>,
    running: Arc<StdMutex<HashMap<String, RunEntry>>>,
    events: broadcast::Sender<CommandEvent>,
}

impl CommandOrchestrator {
    pub fn new(store: Arc<CommandStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            running: Arc::new(StdMutex::new(HashMap::new())),
            events,
        }
    }

    pub fn store(&self) -> &CommandStore {
        &self.store
    }

    /// Launch a run of `command_id`, resolving the target-path
    /// placeholder when an override is given.
    pub async fn start(
        &self,
        command_id: &str,
        target_path: Option<&str>,
    ) -> EngineResult<RunningCommand> {
        let def = self
            .store
            .get(command_id)
            .ok_or_else(|| EngineError::CommandNotFound(command_id.to_string()))?;

        let arguments = resolve_arguments(&def.arguments, target_path);
        let command_line = format!("{} {}", def.executable, arguments.join(" "))
            .trim()
            .to_string();

        let mut cmd = tokio::process::Command::new(&def.executable);
        cmd.args(&arguments);
        if let Some(dir) = &def.working_dir {
            cmd.current_dir(dir);
        }
        if def.run_elevated || def.use_shell_execute {
            // Honored by the platform launcher on Windows builds; the
            // direct spawn path ignores them.
            log::debug!("[Commands] Elevation/shell flags set for '{}'", def.display_name);
        }

        let mut child = cmd.spawn()?;
        let run = RunningCommand {
            run_id: Uuid::new_v4().to_string(),
            command_id: def.id.clone(),
            command_line,
            started_at: Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        };
        log::info!("[Commands] Started '{}' ({})", def.display_name, run.run_id);

        let (kill_tx, mut kill_rx) = mpsc::channel::<()>(1);
        self.running.lock().unwrap().insert(
            run.run_id.clone(),
            RunEntry {
                info: run.clone(),
                kill_on_exit: def.kill_on_exit,
                kill_tx,
            },
        );
        let _ = self.events.send(CommandEvent::Started { run: run.clone() });

        let running = self.running.clone();
        let events = self.events.clone();
        let run_id = run.run_id.clone();
        tokio::spawn(async move {
            let exit_code = tokio::select! {
                status = child.wait() => status.ok().and_then(|s| s.code()),
                _ = kill_rx.recv() => {
                    if let Err(e) = child.start_kill() {
                        log::warn!("[Commands] Kill failed for {run_id}: {e}");
                    }
                    child.wait().await.ok().and_then(|s| s.code())
                }
            };
            running.lock().unwrap().remove(&run_id);
            log::info!("[Commands] Run {run_id} exited with {exit_code:?}");
            let _ = events.send(CommandEvent::Exited { run_id, exit_code });
        });

        Ok(run)
    }

    /// Signal a run to terminate. A run that already exited is reported
    /// as `NotRunning`; kill does not wait for the process to die.
    pub fn kill(&self, run_id: &str) -> EngineResult<()> {
        let running = self.running.lock().unwrap();
        let entry = running
            .get(run_id)
            .ok_or_else(|| EngineError::NotRunning(run_id.to_string()))?;
        let _ = entry.kill_tx.try_send(());
        Ok(())
    }

    pub fn list_running(&self) -> Vec<RunningCommand> {
        self.running
            .lock()
            .unwrap()
            .values()
            .map(|e| e.info.clone())
            .collect()
    }

    /// Change events for the running set; receivers that fall behind
    /// simply miss events, they never block a sender.
    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.events.subscribe()
    }

    /// Terminate every live run whose definition is flagged
    /// kill-on-exit. Called from engine shutdown.
    pub fn shutdown(&self) {
        let running = self.running.lock().unwrap();
        for entry in running.values() {
            if entry.kill_on_exit {
                log::info!("[Commands] Shutdown kill for {}", entry.info.run_id);
                let _ = entry.kill_tx.try_send(());
            }
        }
    }
}
