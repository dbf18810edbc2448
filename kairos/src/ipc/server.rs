//! Unix domain socket server for IPC

use crate::channel::CommandSender;
use crate::command::Command;
use anyhow::{Context, Result};
use kairos_ipc::{read_message, write_message, IpcError, Request, Response};
use std::path::Path;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

/// Bind the control socket, replacing a stale one left by an earlier run.
pub fn bind(path: &Path) -> Result<UnixListener> {
    // Remove old socket if it exists
    let _ = std::fs::remove_file(path);

    let listener = UnixListener::bind(path)
        .with_context(|| format!("Failed to bind IPC socket at {:?}", path))?;
    info!("IPC server listening on {}", path.display());
    Ok(listener)
}

/// Accept clients forever, each on its own task.
pub async fn serve(listener: UnixListener, sender: CommandSender) -> Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let sender = sender.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, sender).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, sender: CommandSender) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // A client may send several requests over one connection.
    loop {
        let request = match read_message::<_, Request>(&mut reader).await {
            Ok(Some(request)) => request,
            Ok(None) => break,
            Err(IpcError::Serialization(e)) => {
                warn!("Malformed request: {}", e);
                let response = Response::Error(format!("Malformed request: {e}"));
                write_message(&mut writer, &response).await?;
                continue;
            }
            Err(e) => {
                // Framing is lost; answer once and hang up.
                let _ = write_message(&mut writer, &Response::Error(e.to_string())).await;
                return Err(e.into());
            }
        };
        debug!(name = %request.name, block = request.block, "IPC request");
        let response = respond(&sender, request).await;
        write_message(&mut writer, &response).await?;
    }

    Ok(())
}

/// Forward one request to the worker and turn the outcome into a response.
pub async fn respond(sender: &CommandSender, request: Request) -> Response {
    let command = Command::from_request(&request);
    let outcome = if request.block {
        sender.send_and_await(command).await.map(Response::from)
    } else {
        sender.send(command).map(|()| Response::Ok)
    };
    outcome.unwrap_or_else(|e| Response::Error(e.to_string()))
}
