//! Shaping of typed backend calls into plain `HttpRequest` values.
//!
//! # Design
//! `ApiRequest` has one variant per endpoint, each carrying exactly the
//! payload that endpoint accepts, so an endpoint without a body cannot be
//! handed one. `Credentials` carries what authenticates the call: the app
//! identity for login, the session id for everything else.
//! `RequestBuilder` is stateless and performs no I/O.

use crate::codec;
use crate::endpoint::{Endpoint, EndpointTable};
use crate::error::ClientError;
use crate::http::HttpRequest;
use crate::types::{AppBeatRequest, AppLoginRequest, BatchRequest};

pub const HEADER_TOKEN: &str = "X-Token";
pub const HEADER_APP_NAME: &str = "X-App-Name";
pub const HEADER_SESSION: &str = "X-Session-Id";

const HEADER_USER_AGENT: &str = "User-Agent";
const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Headers `RequestBuilder` sets itself; extra headers may not override them.
const RESERVED_HEADERS: [&str; 5] = [
    HEADER_TOKEN,
    HEADER_APP_NAME,
    HEADER_SESSION,
    HEADER_USER_AGENT,
    HEADER_CONTENT_TYPE,
];

pub fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS.iter().any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// A typed call to one backend endpoint.
#[derive(Debug, Clone, Copy)]
pub enum ApiRequest<'a> {
    AppLogin(&'a AppLoginRequest),
    AppBeat(&'a AppBeatRequest),
    Batch(&'a BatchRequest),
    ActionsPack,
    AppLogout,
}

impl ApiRequest<'_> {
    pub fn endpoint(&self) -> Endpoint {
        match self {
            ApiRequest::AppLogin(_) => Endpoint::AppLogin,
            ApiRequest::AppBeat(_) => Endpoint::AppBeat,
            ApiRequest::Batch(_) => Endpoint::Batch,
            ApiRequest::ActionsPack => Endpoint::ActionsPack,
            ApiRequest::AppLogout => Endpoint::AppLogout,
        }
    }

    /// JSON body of the call, if the endpoint carries one.
    pub fn body(&self) -> Result<Option<String>, ClientError> {
        match self {
            ApiRequest::AppLogin(req) => codec::encode(Some(*req)),
            ApiRequest::AppBeat(req) => codec::encode(Some(*req)),
            ApiRequest::Batch(req) => codec::encode(Some(*req)),
            ApiRequest::ActionsPack | ApiRequest::AppLogout => Ok(None),
        }
    }
}

/// What authenticates a single call.
#[derive(Debug, Clone, Copy)]
pub enum Credentials<'a> {
    Identity { token: &'a str, app_name: &'a str },
    Session(&'a str),
}

impl Credentials<'_> {
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            Credentials::Identity { token, app_name } => vec![
                (HEADER_TOKEN.to_string(), token.to_string()),
                (HEADER_APP_NAME.to_string(), app_name.to_string()),
            ],
            Credentials::Session(session_id) => {
                vec![(HEADER_SESSION.to_string(), session_id.to_string())]
            }
        }
    }
}

/// Builds `HttpRequest` values for a fixed base URL and endpoint table.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: String,
    endpoints: EndpointTable,
    user_agent: String,
    extra_headers: Vec<(String, String)>,
}

impl RequestBuilder {
    pub fn new(base_url: &str, endpoints: EndpointTable) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
            user_agent: default_user_agent(),
            extra_headers: Vec::new(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Headers added to every request. Names the builder sets itself
    /// (identity, session, `User-Agent`, `Content-Type`) are dropped.
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.extra_headers = headers
            .into_iter()
            .filter(|(name, _)| !is_reserved_header(name))
            .collect();
        self
    }

    pub fn build(&self, request: &ApiRequest<'_>, credentials: &Credentials<'_>) -> Result<HttpRequest, ClientError> {
        let descriptor = self.endpoints.get(request.endpoint());
        let body = request.body()?;

        let mut headers = Vec::with_capacity(self.extra_headers.len() + 4);
        headers.push((HEADER_USER_AGENT.to_string(), self.user_agent.clone()));
        headers.extend(self.extra_headers.iter().cloned());
        if body.is_some() {
            headers.push((HEADER_CONTENT_TYPE.to_string(), "application/json".to_string()));
        }
        headers.extend(credentials.headers());

        Ok(HttpRequest {
            method: descriptor.method,
            url: format!("{}{}", self.base_url, descriptor.path),
            headers,
            body,
        })
    }
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}
