use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::AuthClient;
use crate::channel::{self, ChannelKind, ReverbChannel};
use crate::config::ReverbOptions;
use crate::connection::{ConnectionState, FrameProcessor, Session, WebSocketConnection};
use crate::error::ReverbError;
use crate::event::EventSink;
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::message;
use crate::registry::{ListenerKey, ListenerRegistry};
use crate::transport::{NORMAL_CLOSURE, Transport};
use crate::websocket::TungsteniteTransport;

/// Reason sent with the close frame on `disconnect`.
pub const CLOSE_REASON: &str = "GoodBye";

/// Client for a Laravel Reverb (Pusher protocol) server.
///
/// Owns the single connection, the listener registry and the private-channel
/// auth flow. Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct ReverbClient {
    options: Arc<ReverbOptions>,
    endpoint_url: Url,
    auth: Arc<AuthClient>,
    transport: Arc<dyn Transport>,
    session: Arc<Mutex<Session>>,
    connect_lock: Arc<Mutex<()>>,
    next_generation: Arc<AtomicU64>,
    socket_id: Arc<RwLock<Option<String>>>,
    listeners: Arc<ListenerRegistry>,
    event_sinks: Arc<RwLock<Vec<Arc<dyn EventSink>>>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl ReverbClient {
    /// Create a client using the `tokio-tungstenite` transport and `reqwest`
    /// for auth requests.
    pub fn new(options: ReverbOptions) -> Result<Self, ReverbError> {
        let endpoint_url = options.endpoint_url()?;
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        let auth = AuthClient::new(&options.app_key, &options.auth, http);
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            options: Arc::new(options),
            endpoint_url,
            auth: Arc::new(auth),
            transport: Arc::new(TungsteniteTransport::new()),
            session: Arc::new(Mutex::new(Session::default())),
            connect_lock: Arc::new(Mutex::new(())),
            next_generation: Arc::new(AtomicU64::new(0)),
            socket_id: Arc::new(RwLock::new(None)),
            listeners: Arc::new(ListenerRegistry::new()),
            event_sinks: Arc::new(RwLock::new(Vec::new())),
            state: Arc::new(state),
        })
    }

    /// Replace the WebSocket transport
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the HTTP client used for auth requests
    pub fn with_http_client(mut self, http: Arc<dyn HttpClient>) -> Self {
        self.auth = Arc::new(AuthClient::new(
            &self.options.app_key,
            &self.options.auth,
            http,
        ));
        self
    }

    /// Add a sink for receiving channel events
    pub async fn add_event_sink<S: EventSink + 'static>(&self, sink: S) {
        let mut sinks = self.event_sinks.write().await;
        sinks.push(Arc::new(sink));
    }

    pub fn options(&self) -> &ReverbOptions {
        &self.options
    }

    /// `scheme://url/app/appKey`, composed once when the client was created.
    pub fn endpoint_url(&self) -> &Url {
        &self.endpoint_url
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Socket id assigned by the server, once `pusher:connection_established` arrived
    pub async fn socket_id(&self) -> Option<String> {
        self.socket_id.read().await.clone()
    }

    /// Snapshot of registered `(channel, event)` listeners
    pub fn listeners(&self) -> Vec<ListenerKey> {
        self.listeners.keys()
    }

    /// Connect to the Reverb WebSocket server.
    ///
    /// Resolves once the transport reports the socket open. Calling it while a
    /// live connection exists is a no-op.
    pub async fn connect(&self) -> Result<(), ReverbError> {
        let _connecting = self.connect_lock.lock().await;

        if self.live_connection().await.is_ok() {
            debug!("Already connected to {}", self.endpoint_url);
            return Ok(());
        }

        self.state.send_replace(ConnectionState::Connecting);

        let handle = match self
            .transport
            .open(&self.endpoint_url, &self.options.auth.headers)
            .await
        {
            Ok(handle) => handle,
            Err(e) => {
                let reason = match e {
                    ReverbError::ConnectError(reason) => reason,
                    other => other.to_string(),
                };
                warn!("Failed to connect to {}: {}", self.endpoint_url, reason);
                self.state
                    .send_replace(ConnectionState::Failed(reason.clone()));
                return Err(ReverbError::ConnectError(reason));
            }
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Held until the connection is stored, so a socket that dies right
        // away cannot finish before it is registered.
        let mut session = self.session.lock().await;
        *self.socket_id.write().await = None;

        let processor = FrameProcessor {
            generation,
            outbound: handle.outbound.clone(),
            listeners: Arc::clone(&self.listeners),
            socket_id: Arc::clone(&self.socket_id),
            event_sinks: Arc::clone(&self.event_sinks),
            session: Arc::clone(&self.session),
            state: Arc::clone(&self.state),
            ping_interval: self.options.ping_interval,
        };
        let task = tokio::spawn(processor.run(handle.events));

        session.generation = generation;
        let previous = session.connection.replace(Arc::new(WebSocketConnection::new(
            generation,
            handle.outbound,
            task,
        )));
        if let Some(previous) = previous {
            previous.stop();
        }
        self.state.send_replace(ConnectionState::Connected);

        info!("Connected to Laravel Reverb at {}", self.endpoint_url);
        Ok(())
    }

    /// Subscribe to a channel.
    ///
    /// `private-` channels are authorized first; if that fails nothing is sent.
    /// Subscribing does not register any listener.
    pub async fn subscribe(&self, channel: &str) -> Result<(), ReverbError> {
        let connection = self.live_connection().await?;

        let auth = if ChannelKind::of(channel).requires_auth() {
            if !self.auth.is_configured() {
                return Err(ReverbError::AuthEndpointNotConfigured);
            }
            let socket_id = self.socket_id().await.ok_or_else(|| {
                ReverbError::AuthFailed("no socket id assigned yet".to_string())
            })?;
            Some(self.auth.fetch_auth_token(channel, &socket_id).await?)
        } else {
            None
        };

        let frame = message::subscribe_frame(channel, auth)
            .map_err(|e| ReverbError::SubscribeError(e.to_string()))?;

        // the connection may have gone away during the auth round-trip
        let current = self.live_connection().await?;
        if current.generation != connection.generation {
            return Err(ReverbError::NotConnected);
        }

        current
            .send_text(frame)
            .map_err(|e| ReverbError::SubscribeError(e.to_string()))?;

        debug!("Subscribed to {}", channel);
        Ok(())
    }

    /// Unsubscribe from a channel, dropping all of its listeners first
    pub async fn unsubscribe(&self, channel: &str) -> Result<(), ReverbError> {
        let connection = self.live_connection().await?;

        let removed = self.listeners.remove_channel(channel);
        debug!("Removed {} listeners for {}", removed, channel);

        let frame = message::unsubscribe_frame(channel)
            .map_err(|e| ReverbError::UnsubscribeError(e.to_string()))?;
        connection
            .send_text(frame)
            .map_err(|e| ReverbError::UnsubscribeError(e.to_string()))?;

        debug!("Unsubscribed from {}", channel);
        Ok(())
    }

    /// Deliver `event` on `channel` to the event sinks
    pub async fn listen(&self, channel: &str, event: &str) -> Result<(), ReverbError> {
        // held across the insert so a concurrent disconnect cannot clear first
        let session = self.session.lock().await;
        session.live_connection()?;

        if self.listeners.insert(channel, event) {
            debug!("Listening for {} on {}", event, channel);
        }
        Ok(())
    }

    pub async fn remove_listener(&self, channel: &str, event: &str) -> Result<(), ReverbError> {
        let session = self.session.lock().await;
        session.live_connection()?;

        if self.listeners.remove(channel, event) {
            debug!("Stopped listening for {} on {}", event, channel);
        }
        Ok(())
    }

    /// Drop every listener on `channel` and unsubscribe from it
    pub async fn remove_all_listeners(&self, channel: &str) -> Result<(), ReverbError> {
        let connection = self.live_connection().await?;

        let removed = self.listeners.remove_channel(channel);
        debug!("Removed {} listeners for {}", removed, channel);

        let frame = message::unsubscribe_frame(channel)
            .map_err(|e| ReverbError::RemoveAllListenersError(e.to_string()))?;
        connection.send_text(frame).map_err(|e| {
            ReverbError::RemoveAllListenersError(format!(
                "Failed to send unsubscribe message: {}",
                e
            ))
        })
    }

    /// Subscribe to a public channel and return a handle bound to it
    pub async fn channel(&self, name: &str) -> Result<ReverbChannel, ReverbError> {
        self.subscribe(name).await?;
        Ok(ReverbChannel::new(self.clone(), name))
    }

    /// Subscribe to `private-<name>` and return a handle bound to it
    pub async fn private(&self, name: &str) -> Result<ReverbChannel, ReverbError> {
        let name = channel::private_channel_name(name);
        self.subscribe(&name).await?;
        Ok(ReverbChannel::new(self.clone(), &name))
    }

    /// Disconnect from the server.
    ///
    /// Listeners are cleared before the close frame is queued; the call does
    /// not wait for the closing handshake. A `connect` in flight finishes
    /// first and is then closed.
    pub async fn disconnect(&self) -> Result<(), ReverbError> {
        let _connecting = self.connect_lock.lock().await;

        let connection = {
            let mut session = self.session.lock().await;
            if !self.listeners.is_empty() {
                debug!("Dropping {} listeners", self.listeners.len());
                self.listeners.clear();
            }
            *self.socket_id.write().await = None;
            session.connection.take()
        };

        if let Some(connection) = connection {
            self.state.send_replace(ConnectionState::Closing);

            if let Err(e) = connection.close(NORMAL_CLOSURE, CLOSE_REASON) {
                warn!("Error sending close frame: {}", e);
            }
            connection.stop();

            self.state.send_replace(ConnectionState::Closed);
            info!("Disconnected from {}", self.endpoint_url);
        }

        Ok(())
    }

    async fn live_connection(&self) -> Result<Arc<WebSocketConnection>, ReverbError> {
        self.session.lock().await.live_connection()
    }
}
