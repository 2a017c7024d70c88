use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Instant, Interval};
use tracing::{debug, error, info, trace, warn};

use crate::error::ReverbError;
use crate::event::EventSink;
use crate::message::{self, PusherMessage};
use crate::registry::ListenerRegistry;
use crate::transport::{OutboundFrame, TransportEvent};

/// Lifecycle of the client's single connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// WebSocket connection handler
pub(crate) struct WebSocketConnection {
    pub generation: u64,
    socket: mpsc::Sender<OutboundFrame>,
    task: tokio::task::JoinHandle<()>,
}

impl WebSocketConnection {
    pub fn new(
        generation: u64,
        socket: mpsc::Sender<OutboundFrame>,
        task_handle: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            generation,
            socket,
            task: task_handle,
        }
    }

    pub fn is_open(&self) -> bool {
        !self.socket.is_closed()
    }

    /// Queue a text frame without waiting; a full or closed queue is an error.
    pub fn send_text(&self, text: String) -> Result<(), ReverbError> {
        enqueue(&self.socket, OutboundFrame::Text(text))
    }

    pub fn close(&self, code: u16, reason: &str) -> Result<(), ReverbError> {
        enqueue(
            &self.socket,
            OutboundFrame::Close {
                code,
                reason: reason.to_string(),
            },
        )
    }

    /// Stop processing inbound frames. Frames already queued outbound are still sent.
    pub fn stop(&self) {
        self.task.abort();
    }
}

fn enqueue(socket: &mpsc::Sender<OutboundFrame>, frame: OutboundFrame) -> Result<(), ReverbError> {
    socket.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => ReverbError::SendError("outbound buffer full".to_string()),
        TrySendError::Closed(_) => ReverbError::SendError("socket closed".to_string()),
    })
}

/// The client's connection slot. `generation` identifies which open produced
/// `connection`, so a finished socket never clears its successor.
#[derive(Default)]
pub(crate) struct Session {
    pub generation: u64,
    pub connection: Option<Arc<WebSocketConnection>>,
}

impl Session {
    pub fn live_connection(&self) -> Result<Arc<WebSocketConnection>, ReverbError> {
        self.connection
            .as_ref()
            .filter(|connection| connection.is_open())
            .cloned()
            .ok_or(ReverbError::NotConnected)
    }

    /// Whether the connection opened as `generation` is still the current one.
    pub fn owns(&self, generation: u64) -> bool {
        self.generation == generation && self.connection.is_some()
    }
}

/// Processes inbound frames of one connection, strictly in arrival order.
pub(crate) struct FrameProcessor {
    pub generation: u64,
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub listeners: Arc<ListenerRegistry>,
    pub socket_id: Arc<RwLock<Option<String>>>,
    pub event_sinks: Arc<RwLock<Vec<Arc<dyn EventSink>>>>,
    pub session: Arc<Mutex<Session>>,
    pub state: Arc<watch::Sender<ConnectionState>>,
    pub ping_interval: Option<Duration>,
}

impl FrameProcessor {
    pub async fn run(self, mut events: mpsc::Receiver<TransportEvent>) {
        let mut keepalive = self
            .ping_interval
            .map(|period| tokio::time::interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(TransportEvent::Text(text)) => self.handle_text(&text).await,
                    Some(TransportEvent::Binary(bytes)) => {
                        debug!("Ignoring binary frame of {} bytes", bytes.len());
                    }
                    Some(TransportEvent::Closed { code, reason }) => {
                        info!("Connection closed: {} {}", code, reason);
                        self.finish(ConnectionState::Closed).await;
                        return;
                    }
                    Some(TransportEvent::Failure(reason)) => {
                        error!("Connection failed: {}", reason);
                        self.finish(ConnectionState::Failed(reason)).await;
                        return;
                    }
                    None => {
                        self.finish(ConnectionState::Failed(
                            "transport stopped without closing".to_string(),
                        ))
                        .await;
                        return;
                    }
                },
                _ = tick(&mut keepalive) => self.send(message::ping_frame(), "ping"),
            }
        }
    }

    pub async fn handle_text(&self, text: &str) {
        if !self.is_current().await {
            debug!("Dropping frame from superseded connection");
            return;
        }

        let frame = match PusherMessage::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.report_frame_error(&e).await;
                return;
            }
        };

        match frame.event.as_str() {
            message::CONNECTION_ESTABLISHED => match frame.connection_data() {
                Ok(data) => {
                    debug!("Connection established with socket ID: {}", data.socket_id);
                    if !self.claim_socket_id(&data.socket_id).await {
                        return;
                    }

                    for sink in self.sinks().await {
                        sink.on_connection_established(&data.socket_id).await;
                    }
                }
                Err(e) => self.report_frame_error(&e).await,
            },
            message::PING => self.send(message::pong_frame(), "pong"),
            message::PONG => trace!("Received pong"),
            message::ERROR => match frame.error_data() {
                Ok(data) => {
                    error!("Reverb error: {} (code: {:?})", data.message, data.code);

                    for sink in self.sinks().await {
                        sink.on_error(data.code, &data.message).await;
                    }
                }
                Err(e) => self.report_frame_error(&e).await,
            },
            event => {
                let channel = frame.channel.as_deref().unwrap_or_default();

                if !self.listeners.contains(channel, event) {
                    trace!("No listener for {}|{}", channel, event);
                    return;
                }

                debug!("Channel event: {} on {}", event, channel);
                let data = frame.data_string();
                for sink in self.sinks().await {
                    sink.on_channel_event(channel, event, &data).await;
                }
            }
        }
    }

    fn send(&self, text: String, what: &str) {
        match enqueue(&self.outbound, OutboundFrame::Text(text)) {
            Ok(()) => trace!("Sent {}", what),
            Err(e) => warn!("Failed to send {}: {}", what, e),
        }
    }

    async fn is_current(&self) -> bool {
        self.session.lock().await.owns(self.generation)
    }

    /// Store the socket id unless a newer connection took over in the meantime.
    async fn claim_socket_id(&self, socket_id: &str) -> bool {
        let session = self.session.lock().await;
        if !session.owns(self.generation) {
            return false;
        }
        *self.socket_id.write().await = Some(socket_id.to_string());
        true
    }

    async fn sinks(&self) -> Vec<Arc<dyn EventSink>> {
        self.event_sinks.read().await.clone()
    }

    async fn report_frame_error(&self, error: &ReverbError) {
        for sink in self.sinks().await {
            sink.on_frame_error(error).await;
        }
    }

    async fn finish(&self, state: ConnectionState) {
        let mut session = self.session.lock().await;
        if !session.owns(self.generation) {
            debug!("Ignoring end of superseded connection");
            return;
        }

        session.connection = None;
        *self.socket_id.write().await = None;
        self.state.send_replace(state);
    }
}

async fn tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
