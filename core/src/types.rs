//! Wire DTOs of the backend protocol.
//!
//! Field names follow the backend's snake_case JSON. Free-form payloads
//! (rule definitions, event details, command parameters) stay as
//! `serde_json::Value`; this crate only transports them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// AppLogin
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLoginRequest {
    pub bundle_signature: String,
    pub various_infos: VariousInfos,
    pub agent_type: String,
    pub agent_version: String,
    pub os_type: String,
    pub hostname: String,
    pub runtime_type: String,
    pub runtime_version: String,
    pub framework_type: String,
    pub framework_version: String,
    pub environment: String,
}

/// Process information reported at login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariousInfos {
    pub time: DateTime<Utc>,
    pub pid: u32,
    pub ppid: u32,
    pub euid: u32,
    pub egid: u32,
    pub uid: u32,
    pub gid: u32,
    pub name: String,
}

/// Response to AppLogin. `status == false` means the credentials were
/// rejected, whatever the HTTP status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppLoginResponse {
    pub session_id: String,
    pub status: bool,
    #[serde(default)]
    pub commands: Vec<CommandRequest>,
    #[serde(default)]
    pub features: Features,
    #[serde(default)]
    pub pack_id: String,
    #[serde(default)]
    pub rules: Vec<Value>,
}

/// Agent tuning pushed by the backend at login.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default)]
    pub batch_size: u32,
    #[serde(default)]
    pub max_staleness: u32,
    #[serde(default)]
    pub heartbeat_delay: u32,
}

/// A command the backend asks the agent to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Value>,
    pub uuid: Uuid,
}

// ---------------------------------------------------------------------------
// AppBeat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppBeatRequest {
    /// Results of previously received commands, keyed by command uuid.
    #[serde(default)]
    pub command_results: BTreeMap<String, CommandResult>,
    #[serde(default)]
    pub metrics: Vec<MetricSample>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: bool,
    pub output: String,
}

/// Counters aggregated over `[start, finish)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub start: DateTime<Utc>,
    pub finish: DateTime<Utc>,
    pub observations: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppBeatResponse {
    pub status: bool,
    #[serde(default)]
    pub commands: Vec<CommandRequest>,
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch: Vec<BatchEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum BatchEvent {
    Attack(AttackEvent),
    Exception(ExceptionEvent),
    Track(TrackEvent),
}

/// An attack detected by a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackEvent {
    pub rule_name: String,
    pub test: bool,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub infos: Value,
}

/// An error raised inside the agent, reported for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionEvent {
    pub message: String,
    pub klass: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub infos: Value,
}

/// A custom event tracked by the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEvent {
    pub event: String,
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    #[serde(default)]
    pub user_identifiers: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// ActionsPack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionsPackResponse {
    #[serde(default)]
    pub version: String,
    pub actions: Vec<Action>,
}

/// A detection/response action, e.g. blocking an IP range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action_id: String,
    pub action: String,
    /// Lifetime in seconds; absent means no expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default)]
    pub send_response: bool,
    #[serde(default)]
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_response_tolerates_minimal_body() {
        let res: AppLoginResponse =
            serde_json::from_str(r#"{"session_id":"S1","status":true}"#).unwrap();
        assert_eq!(res.session_id, "S1");
        assert!(res.status);
        assert!(res.commands.is_empty());
        assert_eq!(res.features, Features::default());
    }

    #[test]
    fn login_response_requires_status() {
        let res: Result<AppLoginResponse, _> = serde_json::from_str(r#"{"session_id":"S1"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn batch_events_are_tagged() {
        let event = BatchEvent::Exception(ExceptionEvent {
            message: "boom".to_string(),
            klass: "RuntimeError".to_string(),
            time: DateTime::from_timestamp(0, 0).unwrap(),
            infos: Value::Null,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "exception");
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn action_without_duration_omits_field() {
        let action = Action {
            action_id: "a1".to_string(),
            action: "block_ip".to_string(),
            duration: None,
            send_response: true,
            parameters: serde_json::json!({"ip_cidr": ["10.0.0.0/8"]}),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert!(json.get("duration").is_none());
        assert_eq!(json["parameters"]["ip_cidr"][0], "10.0.0.0/8");
    }
}
