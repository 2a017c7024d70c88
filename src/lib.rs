//! Client for Laravel Reverb and other Pusher-protocol servers.
//!
//! One [`ReverbClient`] drives a single WebSocket: it answers server pings,
//! captures the socket id, authorizes `private-` channels against an auth
//! endpoint and forwards events the host registered interest in to its
//! [`EventSink`]s.

pub mod auth;
pub mod channel;
pub mod client;
pub mod config;
mod connection;
pub mod error;
pub mod event;
pub mod http;
pub mod message;
pub mod registry;
pub mod transport;
pub mod websocket;

pub use channel::{ChannelKind, NOTIFICATION_EVENT, ReverbChannel, private_channel_name};
pub use client::ReverbClient;
pub use config::{AuthOptions, ReverbOptions};
pub use connection::ConnectionState;
pub use error::ReverbError;
pub use event::{ChannelSink, EventSink, SinkEvent};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use registry::{ListenerKey, ListenerRegistry};
pub use transport::{OutboundFrame, Transport, TransportEvent, TransportHandle};
pub use websocket::TungsteniteTransport;
