//! HTTP transport abstraction.
//!
//! The client only needs "GET this URL with these credentials, give me the
//! status and body". Keeping that behind a trait lets tests count attempts
//! and script failures without a socket.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

/// Basic-auth style credentials attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One outgoing GET request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub credentials: Option<Credentials>,
    pub user_agent: String,
    pub timeout: Duration,
}

/// Status and raw body of a completed exchange.
///
/// The body stays as bytes: string lengths in the wire format count bytes,
/// and the gateway does not always answer in UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The exchange did not complete (DNS, connect, TLS, timeout, body read).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a pooled `reqwest` client.
pub struct ReqwestTransport {
    http_client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &'static str {
        "reqwest"
    }

    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http_client
            .get(&request.url)
            .timeout(request.timeout)
            .header(reqwest::header::USER_AGENT, &request.user_agent);

        if let Some(ref credentials) = request.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}
