use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeMap;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::tungstenite::protocol::frame::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::ReverbError;
use crate::transport::{OutboundFrame, Transport, TransportEvent, TransportHandle};

const DEFAULT_BUFFER: usize = 100;

type WsSink = futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Default transport on `tokio-tungstenite`
#[derive(Debug, Clone)]
pub struct TungsteniteTransport {
    buffer: usize,
}

impl Default for TungsteniteTransport {
    fn default() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }
}

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity of the outbound queue; sends fail once it is full.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn open(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<TransportHandle, ReverbError> {
        let mut request = url.as_str().into_client_request()?;
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ReverbError::ConnectError(format!("invalid header name `{}`: {}", name, e))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                ReverbError::ConnectError(format!("invalid value for header `{}`: {}", name, e))
            })?;
            request.headers_mut().insert(header_name, header_value);
        }

        info!("Connecting to Laravel Reverb at {}", url);

        let (ws_stream, response) = connect_async(request).await.map_err(|e| {
            error!("Failed to connect to WebSocket server: {}", e);
            ReverbError::ConnectError(e.to_string())
        })?;

        debug!("Connected to WebSocket server. Status: {}", response.status());

        let (sink, stream) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(self.buffer);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(self.buffer);

        spawn_ws_tasks(sink, stream, outbound_rx, event_tx);

        Ok(TransportHandle {
            outbound: outbound_tx,
            events: event_rx,
        })
    }
}

fn to_message(frame: OutboundFrame) -> Message {
    match frame {
        OutboundFrame::Text(text) => Message::Text(text),
        OutboundFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })),
    }
}

/// Spawn WebSocket send and receive tasks
fn spawn_ws_tasks(
    mut sink: WsSink,
    mut stream: WsStream,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    events: mpsc::Sender<TransportEvent>,
) {
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    tokio::spawn(async move {
        // Task for sending messages
        let failure_events = events.clone();
        let mut send_task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    frame = outbound.recv() => match frame {
                        Some(frame) => to_message(frame),
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                    Some(payload) = pong_rx.recv() => Message::Pong(payload),
                };

                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    error!("Error sending message: {}", e);
                    let _ = failure_events
                        .send(TransportEvent::Failure(e.to_string()))
                        .await;
                    break;
                }
                if closing {
                    debug!("Close frame sent");
                }
            }
        });

        // Task for receiving messages
        let mut receive_task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => {
                        trace!("Received message: {}", text);
                        TransportEvent::Text(text)
                    }
                    Ok(Message::Binary(bytes)) => TransportEvent::Binary(bytes),
                    Ok(Message::Ping(data)) => {
                        let _ = pong_tx.send(data);
                        continue;
                    }
                    Ok(Message::Close(frame)) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((1005, String::new()));
                        debug!("Server closed connection: {} {}", code, reason);
                        let _ = events.send(TransportEvent::Closed { code, reason }).await;
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        let _ = events.send(TransportEvent::Failure(e.to_string())).await;
                        return;
                    }
                };

                if events.send(event).await.is_err() {
                    return;
                }
            }

            let _ = events
                .send(TransportEvent::Failure("connection reset without close frame".to_string()))
                .await;
        });

        tokio::select! {
            _ = &mut send_task => {
                warn!("Send task completed");
                // the receive side decides how the socket ended
                let _ = receive_task.await;
            }
            _ = &mut receive_task => {
                warn!("Receive task completed");
                send_task.abort();
            }
        }
    });
}
