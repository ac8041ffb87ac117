//! The transport seam between `HttpClient` and the network.
//!
//! # Design
//! A transport turns a URL into an `HttpResponse` and nothing more. The URL
//! arrives exactly as the caller composed it, never re-serialized. Responses
//! are plain owned data so fakes can build them directly. Non-2xx statuses are
//! data, not errors; only failures to obtain a response at all become a
//! `TransportError`.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::error::TransportError;

/// An HTTP response described as plain data.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    /// A 200 response carrying `body`.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// First value of header `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Performs a single GET. Implementations must be shareable across tasks.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

/// Default transport backed by a ureq agent.
///
/// ureq is blocking, so each request runs on tokio's blocking pool and the
/// calling task only awaits the join handle.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a preconfigured agent. Its `http_status_as_error` setting decides
    /// whether 4xx/5xx reach the decoder or surface as transport errors.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for UreqTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let url = url.to_string();
        tokio::task::spawn_blocking(move || -> Result<HttpResponse, TransportError> {
            let mut response = agent.get(url.as_str()).call().map_err(TransportError::new)?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| match value.to_str() {
                    Ok(value) => Some((name.as_str().to_string(), value.to_string())),
                    Err(_) => {
                        debug!(header = %name, "skipping non-UTF-8 header value");
                        None
                    }
                })
                .collect();
            let body = response
                .body_mut()
                .read_to_vec()
                .map_err(TransportError::new)?;
            debug!(%url, status, bytes = body.len(), "response received");
            Ok(HttpResponse {
                status,
                headers,
                body: Bytes::from(body),
            })
        })
        .await
        .map_err(TransportError::new)?
    }
}
