use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::ReverbError;

/// Options recognized when creating a client.
///
/// Field names follow the JSON shape hosts already send:
/// `{"url": "...", "appKey": "...", "scheme": "wss", "auth": {"endpoint": "...", "headers": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverbOptions {
    /// Host, optional port and path prefix, without scheme (`ws.example.com:8080`).
    pub url: String,
    pub app_key: String,
    /// `ws` or `wss`.
    pub scheme: String,
    #[serde(default)]
    pub auth: AuthOptions,
    /// Client keepalive period; `None` leaves keepalive to the server's pings.
    #[serde(
        default,
        rename = "pingIntervalSecs",
        with = "duration_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub ping_interval: Option<Duration>,
}

/// Private channel authentication settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Sent with every auth request and with the WebSocket upgrade request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Signs private channels locally instead of calling `endpoint`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_secret: Option<String>,
}

impl ReverbOptions {
    pub fn new(url: &str, app_key: &str, scheme: &str) -> Self {
        Self {
            url: url.to_string(),
            app_key: app_key.to_string(),
            scheme: scheme.to_string(),
            auth: AuthOptions::default(),
            ping_interval: None,
        }
    }

    /// Parse options from the host's JSON representation
    pub fn from_json(json: &str) -> Result<Self, ReverbError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set authentication endpoint
    pub fn with_auth_endpoint(mut self, endpoint: &str) -> Self {
        self.auth.endpoint = Some(endpoint.to_string());
        self
    }

    /// Add a header sent with auth requests and the WebSocket upgrade
    pub fn with_auth_header(mut self, name: &str, value: &str) -> Self {
        self.auth.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Set application secret for local channel signing
    pub fn with_app_secret(mut self, secret: &str) -> Self {
        self.auth.app_secret = Some(secret.to_string());
        self
    }

    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Compose and validate `scheme://url/app/appKey`.
    pub fn endpoint_url(&self) -> Result<Url, ReverbError> {
        if self.url.trim().is_empty() {
            return Err(ReverbError::InvalidConfig("url must not be empty".to_string()));
        }
        if self.app_key.trim().is_empty() {
            return Err(ReverbError::InvalidConfig(
                "appKey must not be empty".to_string(),
            ));
        }
        if !matches!(self.scheme.as_str(), "ws" | "wss") {
            return Err(ReverbError::InvalidConfig(format!(
                "unsupported scheme `{}`, expected ws or wss",
                self.scheme
            )));
        }
        if self.ping_interval.is_some_and(|d| d.is_zero()) {
            return Err(ReverbError::InvalidConfig(
                "pingIntervalSecs must be greater than zero".to_string(),
            ));
        }

        let host = self.url.trim_end_matches('/');
        let url = format!("{}://{}/app/{}", self.scheme, host, self.app_key);
        Ok(Url::parse(&url)?)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_u64(d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}
