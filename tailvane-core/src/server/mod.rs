//! The query/command TCP server.
//!
//! Each accepted connection reads commands one per line and forwards them
//! to the engine, which owns all state; the reply is written back as
//! CRLF-terminated lines and fully flushed before the next command is read.

pub mod command;

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, warn};

/// One client command, with a channel for the engine's reply.
#[derive(Debug)]
pub struct ClientRequest {
    pub line: String,
    pub reply: oneshot::Sender<Reply>,
}

#[derive(Debug)]
pub enum Reply {
    Lines(Vec<String>),
    /// Close the connection (the `quit` verb).
    Close,
}

/// Bind the listener. Failure here is fatal at startup and never retried.
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listen socket {addr}"))
}

/// Accept clients until aborted. Dropping the returned task (or aborting
/// it) also disconnects every client spawned from it.
pub fn spawn_acceptor(
    listener: TcpListener,
    requests: mpsc::Sender<ClientRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "client connected");
                        clients.spawn(handle_client(stream, requests.clone()));
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                    }
                },
                Some(_) = clients.join_next() => {}
            }
        }
    })
}

async fn handle_client(stream: TcpStream, requests: mpsc::Sender<ClientRequest>) {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "<unknown>".to_string());

    match serve_client(stream, requests).await {
        Ok(()) => debug!(peer, "client disconnected"),
        Err(err) if is_clean_disconnect(&err) => debug!(peer, "client dropped connection"),
        Err(err) => error!(peer, error = %err, "client socket error"),
    }
}

fn is_clean_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof
    )
}

async fn serve_client(
    stream: TcpStream,
    requests: mpsc::Sender<ClientRequest>,
) -> std::io::Result<()> {
    let (read, write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    let mut writer = BufWriter::new(write);

    while let Some(line) = lines.next_line().await? {
        let (reply_tx, reply_rx) = oneshot::channel();
        if requests
            .send(ClientRequest {
                line,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            break; // engine is shutting down
        }
        match reply_rx.await {
            Ok(Reply::Lines(reply)) => {
                for line in &reply {
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\r\n").await?;
                }
                writer.flush().await?;
            }
            Ok(Reply::Close) | Err(_) => break,
        }
    }
    Ok(())
}
