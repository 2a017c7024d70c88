use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::error;

use crate::error::ReverbError;

/// Host-side receiver for everything the session engine delivers.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Called when a registered `(channel, event)` pair receives data
    async fn on_channel_event(&self, channel: &str, event: &str, data: &str);

    /// Called when connection is established with the server
    async fn on_connection_established(&self, _socket_id: &str) {}

    /// Called for `pusher:error` frames sent by the server
    async fn on_error(&self, _code: Option<u32>, _message: &str) {}

    /// Called when an inbound frame cannot be decoded. The frame is skipped;
    /// the connection stays up.
    async fn on_frame_error(&self, error: &ReverbError) {
        error!("Dropping malformed frame: {}", error);
    }
}

/// Everything a [`ChannelSink`] forwards
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    ChannelEvent {
        channel: String,
        event: String,
        data: String,
    },
    ConnectionEstablished {
        socket_id: String,
    },
    ServerError {
        code: Option<u32>,
        message: String,
    },
    FrameError {
        message: String,
    },
}

/// Sink that forwards into an unbounded channel, for hosts that prefer to
/// consume events as a stream.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: SinkEvent) {
        // receiver gone means the host stopped listening
        let _ = self.tx.send(event);
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn on_channel_event(&self, channel: &str, event: &str, data: &str) {
        self.forward(SinkEvent::ChannelEvent {
            channel: channel.to_string(),
            event: event.to_string(),
            data: data.to_string(),
        });
    }

    async fn on_connection_established(&self, socket_id: &str) {
        self.forward(SinkEvent::ConnectionEstablished {
            socket_id: socket_id.to_string(),
        });
    }

    async fn on_error(&self, code: Option<u32>, message: &str) {
        self.forward(SinkEvent::ServerError {
            code,
            message: message.to_string(),
        });
    }

    async fn on_frame_error(&self, error: &ReverbError) {
        self.forward(SinkEvent::FrameError {
            message: error.to_string(),
        });
    }
}
