//! Transport collaborator seam.
//!
//! A transport opens one WebSocket and hands back a [`TransportHandle`]: a
//! bounded outbound queue plus the stream of events it observes. The session
//! engine is the only writer to the outbound queue.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use url::Url;

use crate::error::ReverbError;

/// Close code sent on a client-initiated disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Frames written to the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: String },
}

/// What the transport observed on the socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Binary(Vec<u8>),
    Closed { code: u16, reason: String },
    Failure(String),
}

/// An open socket. Returned only once the upgrade handshake succeeded.
pub struct TransportHandle {
    pub outbound: mpsc::Sender<OutboundFrame>,
    pub events: mpsc::Receiver<TransportEvent>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a socket to `url`, sending `headers` with the upgrade request.
    async fn open(
        &self,
        url: &Url,
        headers: &BTreeMap<String, String>,
    ) -> Result<TransportHandle, ReverbError>;
}
