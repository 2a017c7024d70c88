use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;

use crate::error::ReverbError;

/// Status and body of a completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP capability used by the auth client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// POST `form` url-encoded to `url` with the given extra headers.
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, ReverbError>;
}

/// `reqwest`-backed client
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, ReverbError> {
        let mut request = self.client.post(url).form(form);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
