//! Remote sync client
//!
//! Best-effort mirror of roster and session data to a remote aggregation
//! service over a persistent TCP connection. Local operations never block on
//! it: sends either transmit immediately, queue until the first logical
//! connection, or are discarded once the client has given up.
//!
//! The connection is *logically* established only when the server sends a
//! `connected` acknowledgment carrying a client id; a transport-level
//! connect alone leaves the client disconnected. Connection attempts are
//! bounded by a retry budget; once it is exhausted the client gives up for
//! the process lifetime and every later send resolves immediately as
//! dropped, with no queueing and no network activity.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::events::{AppEvent, EventBus};

pub mod protocol;

use protocol::{ServerEvent, WireMessage};

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// host:port of the aggregation server
    pub addr: String,
    /// Total connection attempts before giving up permanently
    pub retry_attempts: u32,
    /// Delay between attempts; canceled early by shutdown
    pub retry_delay: Duration,
}

/// Connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Retry budget exhausted; permanent for the process lifetime
    GaveUp = 3,
}

impl From<u8> for ConnState {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnState::Connecting,
            2 => ConnState::Connected,
            3 => ConnState::GaveUp,
            _ => ConnState::Disconnected,
        }
    }
}

/// Result of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Transmitted to the server (possibly after waiting for the first
    /// logical connection)
    Sent,
    /// Discarded: client has given up, is shutting down, or the write failed
    Dropped,
}

enum Command {
    Send {
        message: WireMessage,
        done: oneshot::Sender<SendOutcome>,
    },
}

struct Pending {
    message: WireMessage,
    done: oneshot::Sender<SendOutcome>,
}

/// Cloneable handle to the sync connection task.
#[derive(Clone)]
pub struct SyncClient {
    state: Arc<AtomicU8>,
    cmd_tx: mpsc::UnboundedSender<Command>,
}

impl SyncClient {
    /// Start the connection task against the configured server.
    pub fn connect(config: SyncConfig, bus: EventBus) -> Self {
        let state = Arc::new(AtomicU8::new(ConnState::Disconnected as u8));
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(run(config, bus, cmd_rx, Arc::clone(&state)));

        Self { state, cmd_tx }
    }

    /// A client that never connects; every send resolves as dropped.
    /// Used when no sync address is configured or debug mode is on.
    pub fn disabled() -> Self {
        let (cmd_tx, _) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(AtomicU8::new(ConnState::GaveUp as u8)),
            cmd_tx,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Logically connected: the server's acknowledgment has been received.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnState::Connected
    }

    /// Send an event-named payload.
    ///
    /// Resolves `Sent` once transmitted. A call made before the first
    /// acknowledgment queues (each call independently, in order) and
    /// resolves when the queue is flushed. After give-up the call resolves
    /// `Dropped` immediately without touching the network.
    pub async fn send(&self, event: &str, data: Value) -> SendOutcome {
        if self.state() == ConnState::GaveUp {
            return SendOutcome::Dropped;
        }

        let (done, done_rx) = oneshot::channel();
        let command = Command::Send {
            message: WireMessage::new(event, data),
            done,
        };
        if self.cmd_tx.send(command).is_err() {
            return SendOutcome::Dropped;
        }
        done_rx.await.unwrap_or(SendOutcome::Dropped)
    }
}

/// Connection task: owns the socket and the pre-connection queue.
async fn run(
    config: SyncConfig,
    bus: EventBus,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    state: Arc<AtomicU8>,
) {
    let set_state = |s: ConnState| state.store(s as u8, Ordering::Release);
    let mut pending: Vec<Pending> = Vec::new();
    let mut attempts = 0u32;

    loop {
        if attempts >= config.retry_attempts {
            warn!(
                "Reconnection attempts to {} exceeded; data for this session will NOT be synced",
                config.addr
            );
            set_state(ConnState::GaveUp);
            for p in pending.drain(..) {
                let _ = p.done.send(SendOutcome::Dropped);
            }
            // Answer any command already in flight, then stop
            while let Some(Command::Send { done, .. }) = cmd_rx.recv().await {
                let _ = done.send(SendOutcome::Dropped);
            }
            return;
        }
        attempts += 1;

        set_state(ConnState::Connecting);
        let stream = match TcpStream::connect(&config.addr).await {
            Ok(stream) => stream,
            Err(e) => {
                info!(
                    "Connection to {} unavailable ({}), re-establishing ({}/{})",
                    config.addr, e, attempts, config.retry_attempts
                );
                set_state(ConnState::Disconnected);
                if !wait_retry_delay(&mut cmd_rx, &mut pending, config.retry_delay).await {
                    return;
                }
                continue;
            }
        };

        // Transport-connected, logically still disconnected until the
        // server acknowledges with a client id.
        let (read_half, write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut writer = write_half;
        let mut acknowledged = false;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let Some(message) = WireMessage::decode(&line) else {
                                debug!("Ignoring malformed server message");
                                continue;
                            };
                            match ServerEvent::from(&message) {
                                ServerEvent::Connected { client_id } => {
                                    info!(
                                        "Connection established with {}; syncing enabled",
                                        config.addr
                                    );
                                    acknowledged = true;
                                    attempts = 0;
                                    set_state(ConnState::Connected);
                                    flush_pending(&mut writer, &mut pending).await;
                                    bus.emit_lossy(AppEvent::RemoteConnected { client_id });
                                }
                                ServerEvent::Disconnect => {
                                    info!("Server requested disconnect; reconnecting");
                                    break;
                                }
                                ServerEvent::RequestAttendanceData => {
                                    bus.emit_lossy(AppEvent::AttendanceRequested);
                                }
                                ServerEvent::Unknown(event) => {
                                    debug!("Ignoring unknown server event '{}'", event);
                                }
                            }
                        }
                        Ok(None) | Err(_) => {
                            info!("Connection to {} lost; attempting to reconnect", config.addr);
                            break;
                        }
                    }
                }
                command = cmd_rx.recv() => {
                    match command {
                        Some(Command::Send { message, done }) => {
                            if acknowledged {
                                let outcome = write_message(&mut writer, &message).await;
                                let failed = outcome == SendOutcome::Dropped;
                                let _ = done.send(outcome);
                                if failed {
                                    break;
                                }
                            } else {
                                pending.push(Pending { message, done });
                            }
                        }
                        // All client handles dropped; process is shutting down
                        None => return,
                    }
                }
            }
        }

        set_state(ConnState::Disconnected);
        if acknowledged {
            bus.emit_lossy(AppEvent::RemoteDisconnected);
        }
    }
}

/// Flush queued sends in order. A failed write resolves that send as
/// dropped; later entries stay queued for the next connection.
async fn flush_pending(writer: &mut OwnedWriteHalf, pending: &mut Vec<Pending>) {
    while !pending.is_empty() {
        let entry = pending.remove(0);
        let outcome = write_message(writer, &entry.message).await;
        let failed = outcome == SendOutcome::Dropped;
        let _ = entry.done.send(outcome);
        if failed {
            break;
        }
    }
}

async fn write_message(writer: &mut OwnedWriteHalf, message: &WireMessage) -> SendOutcome {
    let mut line = message.encode();
    line.push('\n');
    match writer.write_all(line.as_bytes()).await {
        Ok(()) => SendOutcome::Sent,
        Err(e) => {
            warn!("Failed to transmit '{}' event: {}", message.event, e);
            SendOutcome::Dropped
        }
    }
}

/// Sleep out the retry delay while still accepting queue commands, so sends
/// issued during reconnection are not lost. Returns false when every client
/// handle is gone and the task should exit.
async fn wait_retry_delay(
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut Vec<Pending>,
    delay: Duration,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = cmd_rx.recv() => {
                match command {
                    Some(Command::Send { message, done }) => {
                        pending.push(Pending { message, done });
                    }
                    None => return false,
                }
            }
        }
    }
}
