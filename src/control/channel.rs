// src/control/channel.rs

use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::control::message::ControlMessage;
use crate::engine::SupervisorEvent;
use crate::errors::Result;
use crate::types::RunnerId;

/// Environment variable carrying the control address to the runner.
pub const CONTROL_ADDR_ENV: &str = "DEVSUP_CONTROL_ADDR";

/// Supervisor end of one runner's control connection.
///
/// Accepts exactly one connection. Everything it hears re-enters the engine
/// as [`SupervisorEvent`]s tagged with the runner id:
/// - `ControlConnected` once the runner connects,
/// - `Control` for every well-formed line,
/// - `ControlDisconnected` when the runner closes its end.
pub struct ControlChannel {
    runner: RunnerId,
    addr: SocketAddr,
    disconnect: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ControlChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlChannel")
            .field("runner", &self.runner)
            .field("addr", &self.addr)
            .finish_non_exhaustive()
    }
}

impl ControlChannel {
    /// Bind a loopback listener for `runner`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn open(runner: RunnerId, events: mpsc::UnboundedSender<SupervisorEvent>) -> Result<Self> {
        let std_listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))?;
        std_listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(std_listener)?;
        let addr = listener.local_addr()?;

        let (disconnect_tx, disconnect_rx) = oneshot::channel();
        let task = tokio::spawn(serve(runner, listener, events, disconnect_rx));

        debug!(runner = %runner, %addr, "control channel listening");

        Ok(Self {
            runner,
            addr,
            disconnect: Some(disconnect_tx),
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Close the connection. The runner observes end-of-stream, which is its
    /// cue to wind down. Repeated calls are no-ops.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.disconnect.take() {
            if tx.send(()).is_err() {
                debug!(runner = %self.runner, "control channel already closed");
            }
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(
    runner: RunnerId,
    listener: TcpListener,
    events: mpsc::UnboundedSender<SupervisorEvent>,
    mut disconnect_rx: oneshot::Receiver<()>,
) {
    let stream = tokio::select! {
        accepted = listener.accept() => match accepted {
            Ok((stream, peer)) => {
                debug!(runner = %runner, %peer, "runner connected to control channel");
                stream
            }
            Err(e) => {
                warn!(runner = %runner, error = %e, "failed to accept control connection");
                return;
            }
        },
        _ = &mut disconnect_rx => {
            debug!(runner = %runner, "control channel closed before the runner connected");
            return;
        }
    };
    drop(listener);

    let _ = events.send(SupervisorEvent::ControlConnected { runner });

    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match ControlMessage::parse_line(&line) {
                        Ok(message) => {
                            debug!(runner = %runner, kind = message.kind(), "control message received");
                            if events.send(SupervisorEvent::Control { runner, message }).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(runner = %runner, error = %e, "skipping control line"),
                    }
                }
                Ok(None) => {
                    debug!(runner = %runner, "runner closed control channel");
                    let _ = events.send(SupervisorEvent::ControlDisconnected { runner });
                    break;
                }
                Err(e) => {
                    warn!(runner = %runner, error = %e, "control channel read error");
                    let _ = events.send(SupervisorEvent::ControlDisconnected { runner });
                    break;
                }
            },
            _ = &mut disconnect_rx => {
                if let Err(e) = write_half.shutdown().await {
                    debug!(runner = %runner, error = %e, "control channel shutdown failed");
                }
                debug!(runner = %runner, "control channel disconnected by supervisor");
                break;
            }
        }
    }
}
