//! Execution of `HttpRequest` values over the network.
//!
//! # Design
//! `Transport` is the seam between the session client and the HTTP stack.
//! The client only hands it plain request data and expects plain response
//! data back; any response with a status line, including 4xx/5xx, is a
//! successful transport round-trip. Only failures that produce no response
//! at all (DNS, connect, TLS, timeout) are `TransportError`s.
//!
//! `UreqTransport` is the production implementation: a blocking `ureq`
//! agent with connection pooling, per-call timeouts, and proxy resolution
//! from the environment or an explicit proxy URL.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// The request did not produce an HTTP response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

}

impl From<ureq::Error> for TransportError {
    fn from(e: ureq::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Executes one HTTP round-trip. Implementations must be safe to share
/// between threads; the client calls them concurrently.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// How the transport reaches the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ProxyMode {
    /// Use the standard proxy environment variables (`ALL_PROXY`,
    /// `HTTPS_PROXY`, `HTTP_PROXY`) when set.
    #[default]
    FromEnv,
    /// Always go through this proxy.
    Url(String),
    /// Never use a proxy.
    Direct,
}

/// Settings of the network transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Upper bound for a whole call, connect to last body byte.
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub proxy: ProxyMode,
}

/// Blocking transport backed by a pooled `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(options: &TransportOptions) -> Result<Self, ConfigError> {
        let proxy = match &options.proxy {
            ProxyMode::FromEnv => ureq::Proxy::try_from_env(),
            ProxyMode::Url(url) => Some(ureq::Proxy::new(url).map_err(|e| ConfigError::InvalidProxy {
                url: url.clone(),
                reason: e.to_string(),
            })?),
            ProxyMode::Direct => None,
        };

        // Non-2xx responses are data for the codec, not transport errors.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(options.timeout)
            .timeout_connect(options.connect_timeout)
            .proxy(proxy)
            .build()
            .new_agent();

        Ok(Self { agent })
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        trace!(method = %request.method, url = %request.url, "sending request");

        let url = request.url.as_str();
        let headers = request.headers.as_slice();
        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), headers).call(),
            (HttpMethod::Post, Some(body)) => with_headers(self.agent.post(url), headers).send(body.as_bytes()),
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(self.agent.put(url), headers).send(body.as_bytes()),
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), headers).send_empty(),
        };
        let mut response = result?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = read_body(response.body_mut(), status)?;

        trace!(status, bytes = body.len(), "received response");
        Ok(HttpResponse { status, headers, body })
    }
}

/// Read the body as text. Once a status line arrived the response is
/// returned even if its body is not UTF-8 or is too large to buffer; the
/// codec then reports it against the status.
fn read_body(body: &mut ureq::Body, status: u16) -> Result<String, TransportError> {
    match body.read_to_vec() {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(ureq::Error::BodyExceedsLimit(limit)) => {
            debug!(status, limit, "response body exceeds read limit, discarded");
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
