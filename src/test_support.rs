//! In-process mock collector for tests.
//!
//! Binds a loopback WebSocket server that accepts connections sequentially,
//! forwards inbound text frames to the test, and can be scripted to push
//! frames or close the active connection with a chosen code. Reconnect tests
//! rely on the sequential re-accept.

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

// ============================================================================
// Tracing
// ============================================================================

/// Installs a tracing subscriber honoring `RUST_LOG`, once per process.
///
/// Output goes through the test writer so it stays attached to the owning
/// test. Safe to call from every test; later calls are no-ops.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MockCollector
// ============================================================================

/// Commands the test can issue against the active connection.
enum CollectorCommand {
    /// Push a text frame to the connected client.
    Send(String),
    /// Close the active connection with the given code.
    Close(u16),
}

/// Scripted collector endpoint.
pub(crate) struct MockCollector {
    /// `ws://127.0.0.1:{port}` URL to dial.
    pub url: String,
    /// Text frames received from the client, across all connections.
    pub frames: mpsc::UnboundedReceiver<String>,
    /// Emits one unit per accepted connection.
    pub connections: mpsc::UnboundedReceiver<()>,
    /// Command channel to the server task.
    cmd_tx: mpsc::UnboundedSender<CollectorCommand>,
}

impl MockCollector {
    /// Binds the server and spawns its accept loop.
    pub(crate) async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (conn_tx, connections) = mpsc::unbounded_channel();
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<CollectorCommand>();

        tokio::spawn(async move {
            // One connection at a time; re-accept after each close
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let _ = conn_tx.send(());

                loop {
                    tokio::select! {
                        message = ws.next() => {
                            match message {
                                Some(Ok(Message::Text(text))) => {
                                    let _ = frame_tx.send(text.to_string());
                                }
                                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                _ => {}
                            }
                        }

                        command = cmd_rx.recv() => {
                            match command {
                                Some(CollectorCommand::Send(text)) => {
                                    let _ = ws.send(Message::Text(text.into())).await;
                                }
                                Some(CollectorCommand::Close(code)) => {
                                    let frame = CloseFrame {
                                        code: CloseCode::from(code),
                                        reason: "".into(),
                                    };
                                    let _ = ws.send(Message::Close(Some(frame))).await;
                                    break;
                                }
                                None => return,
                            }
                        }
                    }
                }
            }
        });

        Self {
            url: format!("ws://127.0.0.1:{port}"),
            frames,
            connections,
            cmd_tx,
        }
    }

    /// Pushes a text frame to the connected client.
    pub(crate) fn push_frame(&self, text: impl Into<String>) {
        let _ = self.cmd_tx.send(CollectorCommand::Send(text.into()));
    }

    /// Closes the active connection with the given close code.
    pub(crate) fn close_with(&self, code: u16) {
        let _ = self.cmd_tx.send(CollectorCommand::Close(code));
    }
}
