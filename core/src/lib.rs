//! Session-protocol client for the agent control-plane backend.
//!
//! # Overview
//! An agent logs in with its token and app name, then uses the session the
//! backend hands back to send heartbeats, upload event batches, and fetch
//! the actions pack, and finally logs out on shutdown. `Client` runs that
//! protocol over a blocking HTTP transport.
//!
//! # Design
//! - `EndpointTable` maps the five logical operations to method + path and
//!   is validated when the client is built.
//! - Requests are shaped as plain `HttpRequest` data by `RequestBuilder` and
//!   executed by a `Transport` (`UreqTransport` in production), so protocol
//!   logic is testable without a socket.
//! - `codec` checks the status before decoding, keeping unexpected statuses
//!   and malformed bodies apart.
//! - The session id is the only shared mutable state and lives behind one
//!   mutex; it changes only after a call fully succeeds.
//! - Nothing is retried: every error goes back to the caller.

pub mod client;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::ClientConfig;
pub use endpoint::{Endpoint, EndpointDescriptor, EndpointTable};
pub use error::{ClientError, ConfigError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use protocol::{ApiRequest, Credentials, RequestBuilder, HEADER_APP_NAME, HEADER_SESSION, HEADER_TOKEN};
pub use transport::{ProxyMode, Transport, TransportError, TransportOptions, UreqTransport};
pub use types::{
    Action, ActionsPackResponse, AppBeatRequest, AppBeatResponse, AppLoginRequest, AppLoginResponse,
    AttackEvent, BatchEvent, BatchRequest, CommandRequest, CommandResult, ExceptionEvent, Features,
    MetricSample, TrackEvent, VariousInfos,
};
