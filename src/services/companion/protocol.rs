//! Wire protocol for the companion channel.
//!
//! A client writes one newline-terminated text command per connection
//! and disconnects. The command set is tiny and fixed; anything
//! unrecognized is logged and the server keeps serving.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};

use super::refresh::Refresher;

/// Liveness check; a no-op.
pub const CMD_PING: &str = "-2";
/// Terminate the companion with exit status 0.
pub const CMD_EXIT: &str = "-1";
/// Refresh the running game's visual mods.
pub const CMD_REFRESH: &str = "0";

/// What the accept loop should do after a connection is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    Continue,
    Shutdown,
}

/// Read exactly one command line from the connection and dispatch it.
pub async fn handle_connection<S, R>(stream: S, refresher: &R) -> std::io::Result<LoopAction>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: Refresher,
{
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    match line.trim() {
        CMD_PING => {
            log::debug!("[Companion] Ping");
            Ok(LoopAction::Continue)
        }
        CMD_EXIT => {
            log::info!("[Companion] Exit requested");
            Ok(LoopAction::Shutdown)
        }
        CMD_REFRESH => {
            refresher.refresh().await;
            Ok(LoopAction::Continue)
        }
        other => {
            log::error!("[Companion] Unrecognized command: '{other}'");
            Ok(LoopAction::Continue)
        }
    }
}
