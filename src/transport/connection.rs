//! WebSocket connection to the remote collector.
//!
//! This module owns the duplex channel: it dials the collector, tracks the
//! socket state, writes outbound frames in FIFO order, and reports state
//! transitions and inbound messages to the session as [`SocketSignal`]s.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Inbound text frames from the collector (forwarded as signals)
//! - Outbound frames from the workers (via the command channel)
//! - Close frames and transport errors (mapped to close codes)
//!
//! The socket is only ever mutated from this task; `send`/`disconnect` are
//! fire-and-forget from the caller's perspective and safe from any context.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Close code reported when the transport drops without a close frame.
const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Close code for a user-initiated disconnect.
const NORMAL_CLOSE_CODE: u16 = 1000;

// ============================================================================
// SocketState
// ============================================================================

/// Observable state of the duplex channel.
///
/// Transitions are driven by the transport; the session only observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    /// Dial in progress.
    Connecting,
    /// Channel open; frames may flow.
    Open,
    /// Close initiated locally, not yet acknowledged.
    Closing,
    /// Channel closed.
    Closed,
    /// No connection attempt made yet.
    Unknown,
}

// ============================================================================
// SocketSignal
// ============================================================================

/// Notification from the connection's event loop to the session.
#[derive(Debug)]
pub enum SocketSignal {
    /// The channel reached the open state.
    Opened,

    /// An inbound text frame arrived.
    Message(String),

    /// The channel closed with the given transport close code.
    Closed {
        /// Transport close code (1000 normal, 1006 abnormal, 4xxx collector).
        code: u16,
    },

    /// A transport-level error occurred. A `Closed` signal follows.
    Error(String),
}

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the event loop.
enum SocketCommand {
    /// Write a text frame.
    Send(String),
    /// Close the channel with a normal close frame.
    Disconnect,
}

// ============================================================================
// Connection
// ============================================================================

/// Client WebSocket connection to the collector.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and can be shared across tasks; all
/// operations are non-blocking.
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Socket state (shared with event loop).
    state: Arc<Mutex<SocketState>>,
    /// The URL this connection was dialed with.
    url: String,
}

impl Connection {
    /// Dials the collector and spawns the event loop.
    ///
    /// A [`SocketSignal::Opened`] is delivered on `signal_tx` once the
    /// channel is up; all later transitions and inbound messages follow on
    /// the same channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the dial or WebSocket upgrade fails.
    /// No signal is emitted for a failed dial; the caller owns that branch.
    pub async fn open(
        url: &str,
        signal_tx: mpsc::UnboundedSender<SocketSignal>,
    ) -> Result<Self> {
        let state = Arc::new(Mutex::new(SocketState::Connecting));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("dial failed: {e}")))?;

        *state.lock() = SocketState::Open;
        debug!(url, "WebSocket connection established");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let _ = signal_tx.send(SocketSignal::Opened);

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            signal_tx,
            Arc::clone(&state),
        ));

        Ok(Self {
            command_tx,
            state,
            url: url.to_string(),
        })
    }

    /// Returns the current socket state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SocketState {
        *self.state.lock()
    }

    /// Returns the URL this connection was dialed with.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queues a text frame for transmission.
    ///
    /// Frames are written in the order queued; this never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the channel is not open.
    pub fn send(&self, text: String) -> Result<()> {
        if self.state() != SocketState::Open {
            return Err(Error::ConnectionClosed);
        }
        self.command_tx
            .send(SocketCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the channel with a normal close frame.
    ///
    /// No-op if the channel is already closed.
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SocketState::Closing | SocketState::Closed) {
            return;
        }
        *state = SocketState::Closing;
        drop(state);

        let _ = self.command_tx.send(SocketCommand::Disconnect);
    }

    /// Event loop that owns the socket.
    async fn run_event_loop(
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
        signal_tx: mpsc::UnboundedSender<SocketSignal>,
        state: Arc<Mutex<SocketState>>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let close_code;

        loop {
            tokio::select! {
                // Inbound frames from the collector
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            let _ = signal_tx.send(SocketSignal::Message(text.to_string()));
                        }

                        Some(Ok(Message::Close(frame))) => {
                            let code = frame
                                .map(|f| u16::from(f.code))
                                .unwrap_or(ABNORMAL_CLOSE_CODE);
                            debug!(code, "WebSocket closed by collector");
                            close_code = code;
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            let _ = signal_tx.send(SocketSignal::Error(e.to_string()));
                            close_code = ABNORMAL_CLOSE_CODE;
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            close_code = ABNORMAL_CLOSE_CODE;
                            break;
                        }

                        // Ignore Binary, Ping, Pong, raw frames
                        _ => {}
                    }
                }

                // Commands from the workers / session
                command = command_rx.recv() => {
                    match command {
                        Some(SocketCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to write frame");
                                let _ = signal_tx.send(SocketSignal::Error(e.to_string()));
                                close_code = ABNORMAL_CLOSE_CODE;
                                break;
                            }
                        }

                        Some(SocketCommand::Disconnect) => {
                            debug!("Disconnect command received");
                            let frame = CloseFrame {
                                code: CloseCode::Normal,
                                reason: "".into(),
                            };
                            let _ = ws_write.send(Message::Close(Some(frame))).await;
                            let _ = ws_write.close().await;
                            close_code = NORMAL_CLOSE_CODE;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            close_code = ABNORMAL_CLOSE_CODE;
                            break;
                        }
                    }
                }
            }
        }

        *state.lock() = SocketState::Closed;
        let _ = signal_tx.send(SocketSignal::Closed { code: close_code });

        debug!(code = close_code, "Connection event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
