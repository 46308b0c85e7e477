//! In-process fake of the agent control-plane backend.
//!
//! Serves the five protocol endpoints on their default paths, checks the
//! authentication headers the way the real backend does, and records every
//! request it receives so tests can assert on what went over the wire.
//! Responses for a path can be overridden to script failures.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::debug;
use uuid::Uuid;

pub const APP_LOGIN_PATH: &str = "/agent/v1/app-login";
pub const APP_BEAT_PATH: &str = "/agent/v1/app-beat";
pub const BATCH_PATH: &str = "/agent/v0/batch";
pub const ACTIONS_PACK_PATH: &str = "/agent/v0/actionspack";
pub const APP_LOGOUT_PATH: &str = "/agent/v0/app-logout";

const HEADER_TOKEN: &str = "x-token";
const HEADER_APP_NAME: &str = "x-app-name";
const HEADER_SESSION: &str = "x-session-id";

/// A request as seen by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Login response body, as the backend sends it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginReply {
    pub session_id: String,
    pub status: bool,
    pub commands: Vec<Value>,
    pub features: Value,
    pub pack_id: String,
    pub rules: Vec<Value>,
}

#[derive(Debug, Clone)]
struct Scripted {
    status: StatusCode,
    body: String,
}

#[derive(Debug, Default)]
struct BackendState {
    sessions: HashSet<String>,
    next_session_ids: VecDeque<String>,
    rejected_tokens: HashSet<String>,
    scripted: HashMap<String, VecDeque<Scripted>>,
    received: Vec<ReceivedRequest>,
    actions: Vec<Value>,
    pack_version: String,
}

/// Shared handle on the fake backend. Cheap to clone; all clones see the
/// same state.
#[derive(Debug, Clone, Default)]
pub struct Backend {
    state: Arc<Mutex<BackendState>>,
}

impl Backend {
    pub fn new() -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.lock();
            state.pack_version = "1".to_string();
            state.actions = vec![json!({
                "action_id": "block-private-range",
                "action": "block_ip",
                "send_response": true,
                "parameters": {"ip_cidr": ["10.0.0.0/8"]}
            })];
        }
        backend
    }

    /// Every request received so far, in arrival order.
    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.state.lock().received.clone()
    }

    pub fn received_on(&self, path: &str) -> Vec<ReceivedRequest> {
        self.state
            .lock()
            .received
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    /// Use `session_id` for the next successful login instead of a random one.
    pub fn issue_session_id(&self, session_id: &str) {
        self.state.lock().next_session_ids.push_back(session_id.to_string());
    }

    /// Answer logins with this token with `status: false`.
    pub fn reject_token(&self, token: &str) {
        self.state.lock().rejected_tokens.insert(token.to_string());
    }

    /// Answer the next request on `path` with `status` and `body`, bypassing
    /// the normal handler. Scripted responses are consumed in order.
    pub fn respond_once(&self, path: &str, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.state
            .lock()
            .scripted
            .entry(path.to_string())
            .or_default()
            .push_back(Scripted {
                status,
                body: body.to_string(),
            });
    }

    /// Drop a session server-side, as if it expired.
    pub fn expire_session(&self, session_id: &str) -> bool {
        self.state.lock().sessions.remove(session_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.state.lock().sessions.len()
    }

    pub fn set_actions(&self, version: &str, actions: Vec<Value>) {
        let mut state = self.state.lock();
        state.pack_version = version.to_string();
        state.actions = actions;
    }

    fn take_scripted(&self, path: &str) -> Option<Scripted> {
        self.state.lock().scripted.get_mut(path)?.pop_front()
    }

    fn has_session(&self, headers: &HeaderMap) -> bool {
        header(headers, HEADER_SESSION)
            .map(|id| self.state.lock().sessions.contains(id))
            .unwrap_or(false)
    }
}

pub fn app(backend: Backend) -> Router {
    Router::new()
        .route(APP_LOGIN_PATH, post(app_login))
        .route(APP_BEAT_PATH, post(app_beat))
        .route(BATCH_PATH, post(batch))
        .route(ACTIONS_PACK_PATH, get(actions_pack))
        .route(APP_LOGOUT_PATH, post(app_logout))
        .layer(middleware::from_fn_with_state(backend.clone(), record_and_script))
        .with_state(backend)
}

pub async fn run(listener: TcpListener, backend: Backend) -> Result<(), std::io::Error> {
    axum::serve(listener, app(backend)).await
}

/// Records the request, then either answers with a scripted response or
/// forwards to the route handler.
async fn record_and_script(State(backend): State<Backend>, request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    let path = parts.uri.path().to_string();
    let received = ReceivedRequest {
        method: parts.method.to_string(),
        path: path.clone(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect(),
        body: String::from_utf8_lossy(&bytes).into_owned(),
    };
    debug!(method = %received.method, path = %received.path, "received request");
    backend.state.lock().received.push(received);

    if let Some(scripted) = backend.take_scripted(&path) {
        return (scripted.status, scripted.body).into_response();
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

async fn app_login(State(backend): State<Backend>, headers: HeaderMap, Json(_request): Json<Value>) -> Response {
    let (Some(token), Some(_app_name)) = (header(&headers, HEADER_TOKEN), header(&headers, HEADER_APP_NAME)) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let mut state = backend.state.lock();
    if state.rejected_tokens.contains(token) {
        return Json(login_reply(String::new(), false)).into_response();
    }
    let session_id = state
        .next_session_ids
        .pop_front()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    state.sessions.insert(session_id.clone());
    Json(login_reply(session_id, true)).into_response()
}

async fn app_beat(State(backend): State<Backend>, headers: HeaderMap, Json(_request): Json<Value>) -> Response {
    if !backend.has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({"status": true, "commands": []})).into_response()
}

async fn batch(State(backend): State<Backend>, headers: HeaderMap, Json(request): Json<Value>) -> Response {
    if !backend.has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !request.get("batch").map(Value::is_array).unwrap_or(false) {
        return StatusCode::UNPROCESSABLE_ENTITY.into_response();
    }
    StatusCode::OK.into_response()
}

async fn actions_pack(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.has_session(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let state = backend.state.lock();
    Json(json!({"version": state.pack_version, "actions": state.actions})).into_response()
}

async fn app_logout(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    let Some(session_id) = header(&headers, HEADER_SESSION) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    if backend.state.lock().sessions.remove(session_id) {
        StatusCode::OK.into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn login_reply(session_id: String, status: bool) -> LoginReply {
    LoginReply {
        session_id,
        status,
        commands: Vec::new(),
        features: json!({"batch_size": 10, "max_staleness": 60, "heartbeat_delay": 60}),
        pack_id: String::new(),
        rules: Vec::new(),
    }
}
