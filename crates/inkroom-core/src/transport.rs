//! Byte-oriented channels the sync layer sends and receives text frames on.
//!
//! Sends are fire-and-forget: no acknowledgement, retry or backpressure.

use std::sync::mpsc::{Receiver, Sender, channel};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("send failed: {0}")]
    Send(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// A connection that carries room-scoped text messages.
pub trait Transport {
    /// Queue a text frame for sending.
    fn send(&mut self, text: String) -> TransportResult<()>;

    /// Drain frames received since the last poll (non-blocking).
    fn poll_inbound(&mut self) -> Vec<String>;

    fn state(&self) -> ConnectionState;
}

/// In-process transport backed by std channels.
///
/// [`ChannelTransport::pair`] wires two ends together, standing in for two
/// clients joined to the same room.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Sender<String>,
    rx: Receiver<String>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (Self { tx: a_tx, rx: a_rx }, Self { tx: b_tx, rx: b_rx })
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, text: String) -> TransportResult<()> {
        self.tx.send(text).map_err(|e| TransportError::Send(e.to_string()))
    }

    fn poll_inbound(&mut self) -> Vec<String> {
        self.rx.try_iter().collect()
    }

    fn state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
}

// ============================================================================
// Native WebSocket transport
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::sync::mpsc::TryRecvError;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::{Message, connect};
    use url::Url;

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Events from the WebSocket thread.
    enum WsEvent {
        Connected,
        Disconnected,
        Message(String),
        Error(String),
    }

    /// What the connection loop does after draining queued commands.
    #[derive(Debug, PartialEq, Eq)]
    enum Drained {
        Open,
        Close,
        Stop,
    }

    /// Hand every queued outbound message to `send` before the next read.
    fn drain_commands(cmd_rx: &Receiver<WsCommand>, mut send: impl FnMut(String) -> bool) -> Drained {
        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    if !send(msg) {
                        return Drained::Stop;
                    }
                }
                Ok(WsCommand::Close) => return Drained::Close,
                Err(TryRecvError::Empty) => return Drained::Open,
                Err(TryRecvError::Disconnected) => return Drained::Stop,
            }
        }
    }

    /// WebSocket transport for native platforms.
    ///
    /// Uses a background thread for non-blocking operation.
    pub struct WebSocketTransport {
        state: ConnectionState,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<WsEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl WebSocketTransport {
        /// Create a new disconnected transport.
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Connect to a relay endpoint such as `ws://localhost:3030/ws`.
        pub fn connect(&mut self, url: &str) -> TransportResult<()> {
            if self.cmd_tx.is_some() {
                return Err(TransportError::AlreadyConnected);
            }

            let parsed_url = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed_url.scheme()
                )));
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<WsEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("transport thread: connecting to {}", url);

                let (mut socket, response) = match connect(&url) {
                    Ok(connected) => connected,
                    Err(e) => {
                        log::error!("websocket connection failed: {}", e);
                        let _ = event_tx.send(WsEvent::Error(format!("connection failed: {e}")));
                        return;
                    }
                };
                log::info!("websocket connected, status: {}", response.status());
                let _ = event_tx.send(WsEvent::Connected);

                // Short read timeout so the loop can service outgoing commands
                if let tungstenite::stream::MaybeTlsStream::Plain(tcp) = socket.get_mut() {
                    let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
                    let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
                }

                loop {
                    let drained = drain_commands(&cmd_rx, |msg| match socket.send(Message::Text(msg)) {
                        Ok(()) => true,
                        Err(e) => {
                            log::warn!("websocket send error: {}", e);
                            false
                        }
                    });
                    match drained {
                        Drained::Open => {}
                        Drained::Close => {
                            let _ = socket.close(None);
                            break;
                        }
                        Drained::Stop => break,
                    }

                    match socket.read() {
                        Ok(Message::Text(txt)) => {
                            let _ = event_tx.send(WsEvent::Message(txt));
                        }
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("websocket received close frame");
                            break;
                        }
                        Ok(_) => {}
                        Err(tungstenite::Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::WouldBlock
                                || e.kind() == std::io::ErrorKind::TimedOut =>
                        {
                            continue;
                        }
                        Err(e) => {
                            log::error!("websocket read error: {}", e);
                            break;
                        }
                    }
                }

                log::info!("transport thread exiting");
                let _ = event_tx.send(WsEvent::Disconnected);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        /// Disconnect from the server.
        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    impl Default for WebSocketTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for WebSocketTransport {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    impl Transport for WebSocketTransport {
        fn send(&mut self, text: String) -> TransportResult<()> {
            let tx = self.cmd_tx.as_ref().ok_or(TransportError::NotConnected)?;
            tx.send(WsCommand::Send(text))
                .map_err(|e| TransportError::Send(e.to_string()))
        }

        fn poll_inbound(&mut self) -> Vec<String> {
            let mut messages = Vec::new();
            let Some(rx) = self.event_rx.as_ref() else {
                return messages;
            };
            while let Ok(event) = rx.try_recv() {
                match event {
                    WsEvent::Connected => self.state = ConnectionState::Connected,
                    WsEvent::Disconnected => self.state = ConnectionState::Disconnected,
                    WsEvent::Error(message) => {
                        log::warn!("transport error: {}", message);
                        self.state = ConnectionState::Error;
                    }
                    WsEvent::Message(text) => messages.push(text),
                }
            }
            messages
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_drain_sends_every_queued_message() {
            let (tx, rx) = channel();
            for i in 0..5 {
                tx.send(WsCommand::Send(format!("frame {i}"))).unwrap();
            }
            let mut sent = Vec::new();
            assert_eq!(drain_commands(&rx, |msg| { sent.push(msg); true }), Drained::Open);
            assert_eq!(sent.len(), 5);
            assert_eq!(sent[4], "frame 4");
        }

        #[test]
        fn test_drain_stops_on_close_and_failure() {
            let (tx, rx) = channel();
            tx.send(WsCommand::Send("a".into())).unwrap();
            tx.send(WsCommand::Close).unwrap();
            tx.send(WsCommand::Send("after close".into())).unwrap();
            let mut sent = Vec::new();
            assert_eq!(drain_commands(&rx, |msg| { sent.push(msg); true }), Drained::Close);
            assert_eq!(sent, vec!["a".to_string()]);

            assert_eq!(drain_commands(&rx, |_| false), Drained::Stop);
            drop(tx);
            assert_eq!(drain_commands(&rx, |_| true), Drained::Stop);
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::WebSocketTransport;
