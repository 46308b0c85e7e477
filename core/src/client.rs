//! Session-aware client for the agent backend.
//!
//! # Design
//! `Client` owns the request builder, a `Transport`, and the session state.
//! Every operation runs the same pipeline: build the request from the
//! endpoint table, attach identity or session headers, execute it, check the
//! status, decode the body. Session state changes only after that pipeline
//! has fully succeeded, so a failed call leaves the client exactly as it was
//! (apart from `app_login`, which never clears an existing session either).
//!
//! Calls block the current thread until the transport returns or times out.
//! The client is `Sync`; share it behind an `Arc` between the heartbeat loop
//! and the event uploader. Nothing is retried here.

use std::fmt;

use tracing::debug;

use crate::codec;
use crate::config::ClientConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, ConfigError};
use crate::http::HttpResponse;
use crate::protocol::{ApiRequest, Credentials, RequestBuilder};
use crate::session::SessionState;
use crate::transport::{Transport, UreqTransport};
use crate::types::{ActionsPackResponse, AppBeatRequest, AppBeatResponse, AppLoginRequest, AppLoginResponse, BatchRequest};

/// Client for the agent backend session protocol.
///
/// Holds at most one session. `app_login` opens it, `app_logout` closes it,
/// and the other operations fail with `NotAuthenticated` while none is open.
pub struct Client<T: Transport = UreqTransport> {
    requests: RequestBuilder,
    transport: T,
    session: SessionState,
}

// The session id is a credential; only report whether one is held.
impl<T: Transport + fmt::Debug> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("requests", &self.requests)
            .field("transport", &self.transport)
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

impl Client<UreqTransport> {
    /// Client with default settings talking to `base_url`.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Self::from_config(&ClientConfig::new(base_url))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = UreqTransport::new(&config.transport_options())?;
        let mut requests =
            RequestBuilder::new(&config.base_url, config.endpoints.clone()).with_headers(config.extra_headers());
        if let Some(user_agent) = &config.user_agent {
            requests = requests.with_user_agent(user_agent.clone());
        }
        Ok(Self::with_transport(requests, transport))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(requests: RequestBuilder, transport: T) -> Self {
        Self {
            requests,
            transport,
            session: SessionState::new(),
        }
    }

    /// Authenticate the application and open a session.
    ///
    /// `token` and `app_name` are only sent with this request; they are not
    /// kept by the client. A response with `status == false` is an
    /// `Authentication` error and no session is stored.
    pub fn app_login(
        &self,
        request: &AppLoginRequest,
        token: &str,
        app_name: &str,
    ) -> Result<AppLoginResponse, ClientError> {
        let response = self.send(ApiRequest::AppLogin(request), Credentials::Identity { token, app_name })?;
        let login: AppLoginResponse = codec::decode(&response, Endpoint::AppLogin.expected_status())?;

        if !login.status {
            debug!(app_name, "login rejected by backend");
            return Err(ClientError::Authentication);
        }
        if login.session_id.is_empty() {
            return Err(ClientError::Decode("login succeeded without a session id".to_string()));
        }

        let previous = self.session.replace(login.session_id.clone());
        debug!(app_name, replaced = previous.is_some(), "session established");
        Ok(login)
    }

    /// Report liveness and command results.
    pub fn app_beat(&self, request: &AppBeatRequest) -> Result<AppBeatResponse, ClientError> {
        let (_, response) = self.send_authenticated(ApiRequest::AppBeat(request))?;
        codec::decode(&response, Endpoint::AppBeat.expected_status())
    }

    /// Upload a batch of events. The backend only acknowledges it.
    pub fn batch(&self, request: &BatchRequest) -> Result<(), ClientError> {
        let (_, response) = self.send_authenticated(ApiRequest::Batch(request))?;
        codec::expect_ack(&response, Endpoint::Batch.expected_status())
    }

    /// Fetch the current actions pack.
    pub fn actions_pack(&self) -> Result<ActionsPackResponse, ClientError> {
        let (_, response) = self.send_authenticated(ApiRequest::ActionsPack)?;
        codec::decode(&response, Endpoint::ActionsPack.expected_status())
    }

    /// Close the session on the backend, then forget it locally.
    pub fn app_logout(&self) -> Result<(), ClientError> {
        let (session_id, response) = self.send_authenticated(ApiRequest::AppLogout)?;
        codec::expect_ack(&response, Endpoint::AppLogout.expected_status())?;

        let cleared = self.session.clear_if(&session_id);
        debug!(cleared, "session closed");
        Ok(())
    }

    /// Best-effort shutdown: log out if a session is active.
    ///
    /// Returns `Ok(())` when there was nothing to close. A failed logout is
    /// returned to the caller, which typically just reports it.
    pub fn close(&self) -> Result<(), ClientError> {
        if !self.is_authenticated() {
            return Ok(());
        }
        match self.app_logout() {
            // Another caller logged out in between.
            Err(ClientError::NotAuthenticated) => Ok(()),
            other => other,
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session.current()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.current().is_some()
    }

    /// Forget the current session without telling the backend, e.g. after
    /// it rejected the session id.
    pub fn reset_session(&self) {
        if self.session.clear().is_some() {
            debug!("session reset");
        }
    }

    /// Send a session-bearing call. Fails without touching the network when
    /// no session is active. Returns the session id the call was made with.
    fn send_authenticated(&self, request: ApiRequest<'_>) -> Result<(String, HttpResponse), ClientError> {
        let session_id = self.session.current().ok_or(ClientError::NotAuthenticated)?;
        let response = self.send(request, Credentials::Session(&session_id))?;
        Ok((session_id, response))
    }

    fn send(&self, request: ApiRequest<'_>, credentials: Credentials<'_>) -> Result<HttpResponse, ClientError> {
        let endpoint = request.endpoint();
        let http = self.requests.build(&request, &credentials)?;

        debug!(endpoint = endpoint.name(), method = %http.method, url = %http.url, "calling backend");
        let response = self.transport.execute(&http)?;
        debug!(endpoint = endpoint.name(), status = response.status, "backend responded");

        Ok(response)
    }
}
