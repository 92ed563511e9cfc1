//! The companion's accept loop: one named, per-user duplex channel,
//! one client at a time.

use super::protocol::{self, LoopAction};
use super::refresh::Refresher;

/// Fixed channel name, scoped to the current user.
pub fn channel_name(username: &str) -> String {
    format!("skinvault-refresh-{username}")
}

/// Serve connections sequentially until an exit command arrives.
///
/// Per-connection I/O errors are logged and the loop keeps serving;
/// only a fault on the channel itself (bind/accept) propagates, which
/// the binary maps to exit status 1.
#[cfg(unix)]
pub async fn serve<R: Refresher>(username: &str, refresher: &R) -> std::io::Result<()> {
    let socket_path = std::env::temp_dir().join(channel_name(username));
    // A stale socket from a previous run would fail the bind.
    let _ = std::fs::remove_file(&socket_path);
    let listener = tokio::net::UnixListener::bind(&socket_path)?;
    log::info!("[Companion] Listening on {}", socket_path.display());

    loop {
        let (stream, _addr) = listener.accept().await?;
        match protocol::handle_connection(stream, refresher).await {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Shutdown) => break,
            Err(e) => log::error!("[Companion] Connection failed: {e}"),
        }
    }

    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

#[cfg(windows)]
pub async fn serve<R: Refresher>(username: &str, refresher: &R) -> std::io::Result<()> {
    use tokio::net::windows::named_pipe::{PipeMode, ServerOptions};

    let pipe_name = format!(r"\\.\pipe\{}", channel_name(username));
    log::info!("[Companion] Listening on {pipe_name}");

    let mut first = true;
    loop {
        let server = ServerOptions::new()
            .first_pipe_instance(first)
            .pipe_mode(PipeMode::Message)
            .create(&pipe_name)?;
        first = false;

        server.connect().await?;
        match protocol::handle_connection(server, refresher).await {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Shutdown) => break,
            Err(e) => log::error!("[Companion] Connection failed: {e}"),
        }
    }

    Ok(())
}
