use crate::client::ReverbClient;
use crate::error::ReverbError;

pub const PRIVATE_PREFIX: &str = "private-";

/// Event Laravel broadcasts database notifications under.
pub const NOTIFICATION_EVENT: &str =
    "Illuminate\\Notifications\\Events\\BroadcastNotificationCreated";

/// Whether subscribing to a channel needs an auth token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Public,
    Private,
}

impl ChannelKind {
    pub fn of(name: &str) -> Self {
        if name.starts_with(PRIVATE_PREFIX) {
            ChannelKind::Private
        } else {
            ChannelKind::Public
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, ChannelKind::Private)
    }
}

/// Prefix `name` with `private-` unless it already is
pub fn private_channel_name(name: &str) -> String {
    if !name.starts_with(PRIVATE_PREFIX) {
        format!("{}{}", PRIVATE_PREFIX, name)
    } else {
        name.to_string()
    }
}

/// A subscribed channel.
///
/// Returned by [`ReverbClient::channel`] and [`ReverbClient::private`]; every
/// method forwards to the client with this channel's name.
#[derive(Clone)]
pub struct ReverbChannel {
    client: ReverbClient,
    name: String,
}

impl ReverbChannel {
    pub(crate) fn new(client: ReverbClient, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }

    /// Full channel name, including any `private-` prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ChannelKind {
        ChannelKind::of(&self.name)
    }

    pub async fn listen(&self, event: &str) -> Result<(), ReverbError> {
        self.client.listen(&self.name, event).await
    }

    pub async fn remove_listener(&self, event: &str) -> Result<(), ReverbError> {
        self.client.remove_listener(&self.name, event).await
    }

    pub async fn remove_all_listeners(&self) -> Result<(), ReverbError> {
        self.client.remove_all_listeners(&self.name).await
    }

    pub async fn unsubscribe(&self) -> Result<(), ReverbError> {
        self.client.unsubscribe(&self.name).await
    }

    /// Listen for Laravel broadcast notifications on this channel
    pub async fn notifications(&self) -> Result<(), ReverbError> {
        self.listen(NOTIFICATION_EVENT).await
    }

    pub async fn stop_notifications(&self) -> Result<(), ReverbError> {
        self.remove_listener(NOTIFICATION_EVENT).await
    }
}

impl std::fmt::Debug for ReverbChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverbChannel")
            .field("name", &self.name)
            .finish()
    }
}
