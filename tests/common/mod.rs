#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reverb_native::{
    ChannelSink, HttpClient, HttpResponse, OutboundFrame, ReverbClient, ReverbError,
    ReverbOptions, SinkEvent, Transport, TransportEvent, TransportHandle,
};
use serde_json::Value;
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;
use url::Url;

pub const WAIT: Duration = Duration::from_secs(2);

/// Server end of a socket opened through [`MockTransport`].
pub struct ServerSide {
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub frames: mpsc::Receiver<OutboundFrame>,
    pub events: mpsc::Sender<TransportEvent>,
}

impl ServerSide {
    pub async fn push(&self, text: &str) {
        self.events
            .send(TransportEvent::Text(text.to_string()))
            .await
            .expect("frame processor gone");
    }

    pub async fn push_event(&self, event: TransportEvent) {
        self.events.send(event).await.expect("frame processor gone");
    }

    pub async fn establish(&self, socket_id: &str) {
        let data = serde_json::json!({ "socket_id": socket_id, "activity_timeout": 30 }).to_string();
        let frame = serde_json::json!({
            "event": "pusher:connection_established",
            "data": data,
        });
        self.push(&frame.to_string()).await;
    }

    pub async fn push_channel_event(&self, channel: &str, event: &str, data: &str) {
        let frame = serde_json::json!({ "event": event, "channel": channel, "data": data });
        self.push(&frame.to_string()).await;
    }

    pub async fn next_frame(&mut self) -> OutboundFrame {
        timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for an outbound frame")
            .expect("outbound queue closed")
    }

    pub async fn next_json(&mut self) -> Value {
        match self.next_frame().await {
            OutboundFrame::Text(text) => serde_json::from_str(&text).expect("frame is not JSON"),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    pub fn assert_no_frame(&mut self) {
        if let Ok(frame) = self.frames.try_recv() {
            panic!("unexpected outbound frame: {:?}", frame);
        }
    }
}

pub struct MockTransport {
    failure: Option<String>,
    gate: Option<Arc<Notify>>,
    buffer: usize,
    opened: mpsc::UnboundedSender<ServerSide>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        Self::with_buffer(64)
    }

    pub fn with_buffer(buffer: usize) -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>) {
        let (opened, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            failure: None,
            gate: None,
            buffer,
            opened,
        });
        (transport, rx)
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        let (opened, _) = mpsc::unbounded_channel();
        Arc::new(Self {
            failure: Some(reason.to_string()),
            gate: None,
            buffer: 64,
            opened,
        })
    }

    /// Opens only after the returned `Notify` is signalled.
    pub fn gated() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerSide>, Arc<Notify>) {
        let (opened, rx) = mpsc::unbounded_channel();
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(Self {
            failure: None,
            gate: Some(Arc::clone(&gate)),
            buffer: 64,
            opened,
        });
        (transport, rx, gate)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<TransportHandle, ReverbError> {
        if let Some(reason) = &self.failure {
            return Err(ReverbError::ConnectError(reason.clone()));
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let (outbound, frames) = mpsc::channel(self.buffer);
        let (events, inbound) = mpsc::channel(self.buffer);
        let _ = self.opened.send(ServerSide {
            url: url.clone(),
            headers: headers.clone(),
            frames,
            events,
        });

        Ok(TransportHandle {
            outbound,
            events: inbound,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub url: String,
    pub form: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

pub struct MockHttp {
    status: u16,
    body: String,
    gate: Option<Arc<Notify>>,
    requests: Mutex<Vec<AuthRequest>>,
}

impl MockHttp {
    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_string(),
            gate: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Replies only after the returned `Notify` is signalled.
    pub fn gated(status: u16, body: &str) -> (Arc<Self>, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let http = Arc::new(Self {
            status,
            body: body.to_string(),
            gate: Some(Arc::clone(&gate)),
            requests: Mutex::new(Vec::new()),
        });
        (http, gate)
    }

    pub fn requests(&self) -> Vec<AuthRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, ReverbError> {
        self.requests.lock().unwrap().push(AuthRequest {
            url: url.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers: headers.clone(),
        });

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        Ok(HttpResponse {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

pub struct Harness {
    pub client: ReverbClient,
    pub server: ServerSide,
    pub sink: mpsc::UnboundedReceiver<SinkEvent>,
    pub http: Arc<MockHttp>,
    pub opened: mpsc::UnboundedReceiver<ServerSide>,
}

pub fn options() -> ReverbOptions {
    ReverbOptions::new("ws.example.com", "k1", "wss")
}

pub async fn connect(options: ReverbOptions, http: Arc<MockHttp>) -> Harness {
    let (transport, opened) = MockTransport::new();
    connect_with(options, http, transport, opened).await
}

pub async fn connect_with(
    options: ReverbOptions,
    http: Arc<MockHttp>,
    transport: Arc<MockTransport>,
    mut opened: mpsc::UnboundedReceiver<ServerSide>,
) -> Harness {
    let client = ReverbClient::new(options)
        .expect("valid options")
        .with_transport(transport)
        .with_http_client(http.clone());

    let (sink, sink_rx) = ChannelSink::unbounded();
    client.add_event_sink(sink).await;
    client.connect().await.expect("connect");

    let server = opened.recv().await.expect("transport was not opened");
    Harness {
        client,
        server,
        sink: sink_rx,
        http,
        opened,
    }
}

impl Harness {
    pub async fn next_sink_event(&mut self) -> SinkEvent {
        timeout(WAIT, self.sink.recv())
            .await
            .expect("timed out waiting for a sink event")
            .expect("sink closed")
    }

    /// Push `connection_established` and wait until it has been processed.
    pub async fn establish(&mut self, socket_id: &str) {
        self.server.establish(socket_id).await;
        assert_eq!(
            self.next_sink_event().await,
            SinkEvent::ConnectionEstablished {
                socket_id: socket_id.to_string()
            }
        );
    }

    /// Deliver a marker event and assert it is the next thing the sink sees,
    /// proving nothing else was forwarded before it.
    pub async fn assert_quiet_until_marker(&mut self) {
        self.client
            .listen("marker", "marker")
            .await
            .expect("listen for marker");
        self.server
            .push_channel_event("marker", "marker", "marker")
            .await;
        assert_eq!(self.next_sink_event().await, channel_event("marker", "marker", "marker"));
        self.client
            .remove_listener("marker", "marker")
            .await
            .expect("remove marker");
    }
}

pub fn channel_event(channel: &str, event: &str, data: &str) -> SinkEvent {
    SinkEvent::ChannelEvent {
        channel: channel.to_string(),
        event: event.to_string(),
        data: data.to_string(),
    }
}
