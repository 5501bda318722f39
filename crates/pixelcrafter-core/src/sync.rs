//! WebSocket transport for collaboration.
//!
//! A [`ChannelConnector`] opens one [`CollabChannel`] per project. Channels
//! never block the caller: sends are queued and incoming traffic is collected
//! until [`CollabChannel::poll_events`] drains it.

use crate::collaboration::CollabMessage;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from a collaboration channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    Message(CollabMessage),
    Error { message: String },
}

/// Channel errors.
#[derive(Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Not connected")]
    NotConnected,
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Send failed: {0}")]
    Send(String),
}

/// Result type for channel operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Socket URL for a project: the API base with `http` turned into `ws`
/// (`https` into `wss`) and path `/api/ws/collaborate/{project_id}`.
pub fn collaboration_url(api_base_url: &str, project_id: &str) -> SyncResult<String> {
    let mut url = Url::parse(api_base_url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(SyncError::InvalidUrl(format!("unsupported scheme {}", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| SyncError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;
    let path = format!(
        "{}/api/ws/collaborate/{}",
        url.path().trim_end_matches('/'),
        project_id
    );
    url.set_path(&path);
    Ok(url.to_string())
}

/// An open per-project socket.
pub trait CollabChannel: Send {
    /// Queue a message for sending.
    fn send(&mut self, message: &CollabMessage) -> SyncResult<()>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<ChannelEvent>;

    /// Close the socket. Further sends fail.
    fn disconnect(&mut self);

    fn state(&self) -> ConnectionState;
}

/// Opens channels.
pub trait ChannelConnector: Send + Sync {
    fn connect(&self, url: &str) -> SyncResult<Box<dyn CollabChannel>>;
}

/// At most the first 100 characters of an outgoing frame, for debug logs.
fn log_preview(text: &str) -> &str {
    match text.char_indices().nth(100) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, connect};

    /// Short read timeout so the socket loop can service outgoing commands,
    /// whether or not the stream is wrapped in TLS.
    fn set_stream_timeouts(stream: &mut MaybeTlsStream<TcpStream>) {
        let tcp = match stream {
            MaybeTlsStream::Plain(tcp) => tcp,
            MaybeTlsStream::Rustls(tls) => tls.get_mut(),
            _ => {
                log::warn!("Collaboration socket: unknown stream type, reads may block");
                return;
            }
        };
        let _ = tcp.set_read_timeout(Some(Duration::from_millis(50)));
        let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
    }

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client backed by `tungstenite` on a background thread.
    pub struct NativeWebSocket {
        state: ConnectionState,
        events: Vec<ChannelEvent>,
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<ChannelEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                events: Vec::new(),
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Start connecting. Progress is reported through `poll_events`.
        pub fn connect(&mut self, url: &str) -> SyncResult<()> {
            if self.cmd_tx.is_some() {
                return Err(SyncError::AlreadyConnected);
            }

            let parsed_url = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
            if parsed_url.scheme() != "ws" && parsed_url.scheme() != "wss" {
                return Err(SyncError::InvalidUrl(format!(
                    "Invalid WebSocket URL scheme: {}",
                    parsed_url.scheme()
                )));
            }

            if parsed_url.scheme() == "wss" {
                // Fails harmlessly when a provider is already installed.
                let _ = rustls::crypto::ring::default_provider().install_default();
            }

            self.state = ConnectionState::Connecting;

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<ChannelEvent>();
            let url = url.to_string();

            let handle = thread::spawn(move || {
                log::info!("Collaboration socket: connecting to {}", url);

                let (mut socket, response) = match connect(&url) {
                    Ok(connected) => connected,
                    Err(e) => {
                        log::error!("Collaboration socket connection failed: {}", e);
                        let _ = event_tx.send(ChannelEvent::Error {
                            message: format!("Connection failed: {}", e),
                        });
                        return;
                    }
                };
                log::info!("Collaboration socket connected, status: {}", response.status());
                let _ = event_tx.send(ChannelEvent::Connected);

                set_stream_timeouts(socket.get_mut());

                loop {
                    match cmd_rx.try_recv() {
                        Ok(WsCommand::Send(msg)) => {
                            log::debug!("Collaboration socket sending: {}", log_preview(&msg));
                            if let Err(e) = socket.send(Message::Text(msg)) {
                                log::error!("Collaboration socket send error: {}", e);
                                break;
                            }
                        }
                        Ok(WsCommand::Close) => {
                            log::info!("Collaboration socket close requested");
                            let _ = socket.close(None);
                            break;
                        }
                        Err(TryRecvError::Disconnected) => break,
                        Err(TryRecvError::Empty) => {}
                    }

                    match socket.read() {
                        Ok(Message::Text(txt)) => match serde_json::from_str::<CollabMessage>(&txt) {
                            Ok(message) => {
                                let _ = event_tx.send(ChannelEvent::Message(message));
                            }
                            Err(e) => log::warn!("Unreadable collaboration message ({}): {}", e, txt),
                        },
                        Ok(Message::Ping(data)) => {
                            let _ = socket.send(Message::Pong(data));
                        }
                        Ok(Message::Close(_)) => {
                            log::info!("Collaboration socket received close frame");
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
                            log::error!("Collaboration socket read error: {}", e);
                            break;
                        }
                    }
                }

                log::info!("Collaboration socket thread exiting");
                let _ = event_tx.send(ChannelEvent::Disconnected);
            });

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            Ok(())
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CollabChannel for NativeWebSocket {
        fn send(&mut self, message: &CollabMessage) -> SyncResult<()> {
            let tx = self.cmd_tx.as_ref().ok_or(SyncError::NotConnected)?;
            let text = serde_json::to_string(message).map_err(|e| SyncError::Send(e.to_string()))?;
            tx.send(WsCommand::Send(text))
                .map_err(|e| SyncError::Send(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<ChannelEvent> {
            if let Some(ref rx) = self.event_rx {
                while let Ok(event) = rx.try_recv() {
                    match &event {
                        ChannelEvent::Connected => self.state = ConnectionState::Connected,
                        ChannelEvent::Disconnected => self.state = ConnectionState::Disconnected,
                        ChannelEvent::Error { .. } => self.state = ConnectionState::Error,
                        ChannelEvent::Message(_) => {}
                    }
                    self.events.push(event);
                }
            }
            std::mem::take(&mut self.events)
        }

        fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Opens [`NativeWebSocket`] channels.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct NativeConnector;

    impl ChannelConnector for NativeConnector {
        fn connect(&self, url: &str) -> SyncResult<Box<dyn CollabChannel>> {
            let mut socket = NativeWebSocket::new();
            socket.connect(url)?;
            Ok(Box::new(socket))
        }
    }
}

pub use native_client::{NativeConnector, NativeWebSocket};

// ============================================================================
// In-process channel
// ============================================================================

#[derive(Debug, Default)]
struct LocalChannelState {
    state: ConnectionState,
    urls: Vec<String>,
    sent: Vec<CollabMessage>,
    incoming: Vec<ChannelEvent>,
}

/// Channel that never leaves the process.
///
/// Clones share state: keep one handle to inject incoming messages and
/// inspect what was sent while the editor owns another.
#[derive(Debug, Clone, Default)]
pub struct LocalChannel {
    inner: Arc<Mutex<LocalChannelState>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a message as if it came from the server.
    pub fn push_incoming(&self, message: CollabMessage) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.incoming.push(ChannelEvent::Message(message));
        }
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<CollabMessage> {
        self.inner.lock().map(|i| i.sent.clone()).unwrap_or_default()
    }

    /// URLs passed to `connect`, oldest first.
    pub fn connected_urls(&self) -> Vec<String> {
        self.inner.lock().map(|i| i.urls.clone()).unwrap_or_default()
    }
}

impl CollabChannel for LocalChannel {
    fn send(&mut self, message: &CollabMessage) -> SyncResult<()> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| SyncError::Send(format!("Lock error: {}", e)))?;
        if inner.state != ConnectionState::Connected {
            return Err(SyncError::NotConnected);
        }
        inner.sent.push(message.clone());
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<ChannelEvent> {
        self.inner
            .lock()
            .map(|mut i| std::mem::take(&mut i.incoming))
            .unwrap_or_default()
    }

    fn disconnect(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.state = ConnectionState::Disconnected;
        }
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().map(|i| i.state).unwrap_or(ConnectionState::Error)
    }
}

impl ChannelConnector for LocalChannel {
    fn connect(&self, url: &str) -> SyncResult<Box<dyn CollabChannel>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| SyncError::Send(format!("Lock error: {}", e)))?;
        inner.state = ConnectionState::Connected;
        inner.urls.push(url.to_string());
        inner.incoming.push(ChannelEvent::Connected);
        Ok(Box::new(self.clone()))
    }
}
