use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AuthOptions;
use crate::error::ReverbError;
use crate::http::HttpClient;

/// Obtains private-channel auth tokens.
///
/// Holds no per-call state: every call is an independent request and tokens
/// are never cached.
pub struct AuthClient {
    app_key: String,
    endpoint: Option<String>,
    headers: BTreeMap<String, String>,
    app_secret: Option<String>,
    http: Arc<dyn HttpClient>,
}

impl AuthClient {
    pub fn new(app_key: &str, options: &AuthOptions, http: Arc<dyn HttpClient>) -> Self {
        Self {
            app_key: app_key.to_string(),
            endpoint: options.endpoint.clone(),
            headers: options.headers.clone(),
            app_secret: options.app_secret.clone(),
            http,
        }
    }

    /// Whether a token can be produced at all (endpoint or local secret).
    pub fn is_configured(&self) -> bool {
        self.app_secret.is_some() || self.endpoint.is_some()
    }

    /// Exchange `channel` + `socket_id` for the `auth` value of a subscribe frame.
    pub async fn fetch_auth_token(
        &self,
        channel: &str,
        socket_id: &str,
    ) -> Result<String, ReverbError> {
        if let Some(secret) = &self.app_secret {
            return self.sign(secret, channel, socket_id);
        }

        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or(ReverbError::AuthEndpointNotConfigured)?;

        debug!("Requesting auth token for {} from {}", channel, endpoint);

        let form = [("channel_name", channel), ("socket_id", socket_id)];
        let response = self
            .http
            .post_form(endpoint, &form, &self.headers)
            .await
            .map_err(|e| {
                warn!("Auth request for {} failed: {}", channel, e);
                ReverbError::AuthFailed(e.to_string())
            })?;

        if !response.is_success() {
            return Err(ReverbError::AuthFailed(format!("HTTP {}", response.status)));
        }

        if response.body.trim().is_empty() {
            return Err(ReverbError::AuthFailed("Empty response body".to_string()));
        }

        let auth_data: serde_json::Value = serde_json::from_str(&response.body)
            .map_err(|e| ReverbError::AuthFailed(format!("Invalid auth response: {}", e)))?;

        auth_data["auth"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ReverbError::AuthFailed("Auth response has no `auth` field".to_string()))
    }

    // app_key:hex(HMAC-SHA256(secret, "socket_id:channel"))
    fn sign(&self, secret: &str, channel: &str, socket_id: &str) -> Result<String, ReverbError> {
        let signature = format!("{}:{}", socket_id, channel);
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|_| ReverbError::AuthFailed("HMAC creation failed".to_string()))?;

        mac.update(signature.as_bytes());
        let result = mac.finalize().into_bytes();

        Ok(format!("{}:{}", self.app_key, hex::encode(result)))
    }
}
