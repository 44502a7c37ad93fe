//! Planner transport – ZeroMQ REP socket on a dedicated thread.
//!
//! ## Threading model
//!
//! ```text
//! Frame loop                      │  Transport thread (Tokio, current-thread)
//! ─────────────────────────────── │ ──────────────────────────────────────────
//! TransportChannel::set_outbound  │  AwaitingRequest
//!   → outbound.put(snapshot)      │    recv() → inbound.put(text)
//!                                 │  ReadyToRespond
//! TransportChannel::latest_inbound│    outbound.take() or last sent
//!   ← inbound.take()              │    send() → sleep(reply_delay)
//! ```
//!
//! A REP socket must answer every request before it can receive the next
//! one. Until the first snapshot has been handed over the reply is held and
//! the outbound mailbox is polled; after that the last payload sent is
//! reused whenever nothing newer is waiting.
//!
//! The thread owns its runtime and the socket. Faults end the thread and are
//! visible only through [`TransportChannel::status`].

use crate::channel::{Mailbox, PlannerChannel};
use crate::config::TransportConfig;
use crate::error::TransportError;
use bytes::Bytes;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::Notify;
use zeromq::{RepSocket, Socket, SocketRecv, SocketSend, ZmqMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Starting,
    Listening,
    /// The thread ended on an error.
    Faulted(String),
    Stopped,
}

impl TransportStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Starting | Self::Listening)
    }
}

/// Where the exchange is in the request/reply alternation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingRequest,
    ReadyToRespond,
}

/// State shared between the handle and the transport thread.
#[derive(Clone)]
struct Shared {
    inbound: Mailbox<String>,
    outbound: Mailbox<String>,
    status: Arc<Mutex<TransportStatus>>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Shared {
    fn set_status(&self, status: TransportStatus) {
        *self.status.lock() = status;
    }
}

// ---------------------------------------------------------------------------
// Handle (owned by the frame loop)
// ---------------------------------------------------------------------------

/// [`PlannerChannel`] backed by a ZeroMQ REP socket.
///
/// Dropping the handle stops the thread and waits for it.
pub struct TransportChannel {
    shared: Shared,
    endpoint: String,
    thread: Option<thread::JoinHandle<()>>,
}

impl TransportChannel {
    /// Spawn the transport thread and bind `config.endpoint()`.
    ///
    /// Returns as soon as the thread is running; a bind failure shows up as
    /// [`TransportStatus::Faulted`].
    pub fn start(config: TransportConfig) -> Result<Self, TransportError> {
        let shared = Shared {
            inbound: Mailbox::new(),
            outbound: Mailbox::new(),
            status: Arc::new(Mutex::new(TransportStatus::Starting)),
            running: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        };
        let endpoint = config.endpoint();

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("rehab-bridge-transport".into())
            .spawn(move || run_thread(config, thread_shared))?;

        Ok(Self {
            shared,
            endpoint,
            thread: Some(handle),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn status(&self) -> TransportStatus {
        self.shared.status.lock().clone()
    }

    /// Signal the thread to exit and wait for it. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        self.shared.running.store(false, Ordering::Release);
        self.shared.shutdown.notify_one();
        if handle.join().is_err() {
            error!("Transport thread panicked");
            self.shared
                .set_status(TransportStatus::Faulted("thread panicked".into()));
        }
    }
}

impl PlannerChannel for TransportChannel {
    fn set_outbound(&self, payload: String) {
        self.shared.outbound.put(payload);
    }

    fn latest_inbound(&self) -> Option<String> {
        self.shared.inbound.take()
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

// ---------------------------------------------------------------------------
// Transport thread
// ---------------------------------------------------------------------------

fn run_thread(config: TransportConfig, shared: Shared) {
    let span = tracing::info_span!("transport", endpoint = %config.endpoint());
    let _guard = span.enter();

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to create transport runtime: {}", e);
            shared.set_status(TransportStatus::Faulted(
                TransportError::Runtime(e).to_string(),
            ));
            return;
        }
    };

    match rt.block_on(serve(&config, &shared)) {
        Ok(()) => {
            info!("Transport stopped");
            shared.set_status(TransportStatus::Stopped);
        }
        Err(e) => {
            error!("Transport fault: {}", e);
            shared.set_status(TransportStatus::Faulted(e.to_string()));
        }
    }
}

async fn serve(config: &TransportConfig, shared: &Shared) -> Result<(), TransportError> {
    let endpoint = config.endpoint();
    let mut socket = RepSocket::new();
    socket
        .bind(&endpoint)
        .await
        .map_err(|source| TransportError::Bind {
            endpoint: endpoint.clone(),
            source,
        })?;

    info!("Listening for planner on {}", endpoint);
    shared.set_status(TransportStatus::Listening);

    let result = exchange(&mut socket, config, shared).await;
    for e in socket.close().await {
        debug!("Error while closing socket: {}", e);
    }
    result
}

async fn exchange(
    socket: &mut RepSocket,
    config: &TransportConfig,
    shared: &Shared,
) -> Result<(), TransportError> {
    let mut phase = Phase::AwaitingRequest;
    let mut last_sent: Option<Bytes> = None;

    while shared.running.load(Ordering::Acquire) {
        match phase {
            Phase::AwaitingRequest => {
                let request = tokio::select! {
                    msg = socket.recv() => msg?,
                    _ = shared.shutdown.notified() => break,
                };
                match request_text(&request) {
                    Some(text) => shared.inbound.put(text),
                    None => warn!("Dropping planner request that is not UTF-8 text"),
                }
                phase = Phase::ReadyToRespond;
            }
            Phase::ReadyToRespond => {
                let payload = match shared.outbound.take() {
                    Some(fresh) => Bytes::from(fresh),
                    None => match &last_sent {
                        Some(previous) => previous.clone(),
                        None => {
                            // Nothing to answer with yet.
                            tokio::select! {
                                _ = tokio::time::sleep(config.poll_interval()) => continue,
                                _ = shared.shutdown.notified() => break,
                            }
                        }
                    },
                };

                socket.send(ZmqMessage::from(payload.clone())).await?;
                last_sent = Some(payload);
                phase = Phase::AwaitingRequest;

                tokio::select! {
                    _ = tokio::time::sleep(config.reply_delay()) => {}
                    _ = shared.shutdown.notified() => break,
                }
            }
        }
    }

    Ok(())
}

/// First frame of a request as text. Planner requests are single-frame JSON.
fn request_text(msg: &ZmqMessage) -> Option<String> {
    let frame = msg.get(0)?;
    match std::str::from_utf8(frame) {
        Ok(text) => Some(text.to_owned()),
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_text_reads_first_frame() {
        let msg = ZmqMessage::from(Bytes::from_static(b"{\"timestepNumber\":1}"));
        assert_eq!(request_text(&msg).as_deref(), Some("{\"timestepNumber\":1}"));
    }

    #[test]
    fn request_text_rejects_binary() {
        let msg = ZmqMessage::from(Bytes::from_static(&[0xff, 0xfe, 0x00]));
        assert_eq!(request_text(&msg), None);
    }

    #[test]
    fn running_statuses() {
        assert!(TransportStatus::Starting.is_running());
        assert!(TransportStatus::Listening.is_running());
        assert!(!TransportStatus::Stopped.is_running());
        assert!(!TransportStatus::Faulted("x".into()).is_running());
    }
}
