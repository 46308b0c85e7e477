//! Logical backend endpoints and their HTTP routing.
//!
//! # Design
//! `Endpoint` names the five operations of the backend protocol. An
//! `EndpointTable` maps each of them to a method and path. The table is
//! validated in full when it is built, so a lookup on a constructed table
//! cannot fail: a missing or malformed entry is a configuration error
//! reported at startup, never at call time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::http::HttpMethod;

/// A logical backend operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    AppLogin,
    AppBeat,
    Batch,
    ActionsPack,
    AppLogout,
}

impl Endpoint {
    pub const ALL: [Endpoint; 5] = [
        Endpoint::AppLogin,
        Endpoint::AppBeat,
        Endpoint::Batch,
        Endpoint::ActionsPack,
        Endpoint::AppLogout,
    ];

    /// Configuration key of the endpoint.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::AppLogin => "app_login",
            Endpoint::AppBeat => "app_beat",
            Endpoint::Batch => "batch",
            Endpoint::ActionsPack => "actions_pack",
            Endpoint::AppLogout => "app_logout",
        }
    }

    /// Accepts both the configuration key (`app_login`) and the protocol
    /// name (`AppLogin`).
    pub fn from_name(name: &str) -> Option<Self> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.name() == name || format!("{e:?}") == name)
    }

    /// The method the backend serves this operation on.
    pub fn wire_method(self) -> HttpMethod {
        match self {
            Endpoint::ActionsPack => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Status code of a successful response.
    pub fn expected_status(self) -> u16 {
        200
    }

    /// Whether the call must carry the session header.
    pub fn requires_session(self) -> bool {
        self != Endpoint::AppLogin
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Method and path of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub method: HttpMethod,
    pub path: String,
}

/// Entry shape used in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEndpoint {
    pub method: String,
    pub path: String,
}

/// Validated mapping from every `Endpoint` to its descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, RawEndpoint>")]
pub struct EndpointTable {
    descriptors: [EndpointDescriptor; 5],
}

impl EndpointTable {
    /// Build a table from `(name, method, path)` entries.
    ///
    /// Every endpoint must appear exactly once. Names are matched with
    /// `Endpoint::from_name`.
    pub fn from_entries<I, N, M, P>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (N, M, P)>,
        N: AsRef<str>,
        M: AsRef<str>,
        P: Into<String>,
    {
        let mut slots: [Option<EndpointDescriptor>; 5] = Default::default();

        for (name, method, path) in entries {
            let name = name.as_ref();
            let endpoint =
                Endpoint::from_name(name).ok_or_else(|| ConfigError::UnknownEndpoint(name.to_string()))?;
            let method = HttpMethod::parse(method.as_ref()).ok_or_else(|| ConfigError::InvalidMethod {
                endpoint: endpoint.name(),
                method: method.as_ref().to_string(),
            })?;
            let path = path.into();
            validate(endpoint, method, &path)?;

            let slot = &mut slots[endpoint.index()];
            if slot.is_some() {
                return Err(ConfigError::DuplicateEndpoint(endpoint.name()));
            }
            *slot = Some(EndpointDescriptor { method, path });
        }

        let mut descriptors = Vec::with_capacity(Endpoint::ALL.len());
        for (endpoint, slot) in Endpoint::ALL.into_iter().zip(slots) {
            descriptors.push(slot.ok_or(ConfigError::MissingEndpoint(endpoint.name()))?);
        }
        let descriptors: [EndpointDescriptor; 5] = descriptors
            .try_into()
            .map_err(|_| ConfigError::Parse("endpoint table size".to_string()))?;
        Ok(Self { descriptors })
    }

    /// Parse a JSON object keyed by endpoint name:
    /// `{"app_login": {"method": "POST", "path": "/..."}, ...}`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, RawEndpoint> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::try_from(raw)
    }

    pub fn get(&self, endpoint: Endpoint) -> &EndpointDescriptor {
        &self.descriptors[endpoint.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Endpoint, &EndpointDescriptor)> {
        Endpoint::ALL.into_iter().zip(self.descriptors.iter())
    }
}

impl Default for EndpointTable {
    fn default() -> Self {
        let descriptor = |method, path: &str| EndpointDescriptor {
            method,
            path: path.to_string(),
        };
        Self {
            descriptors: [
                descriptor(HttpMethod::Post, "/agent/v1/app-login"),
                descriptor(HttpMethod::Post, "/agent/v1/app-beat"),
                descriptor(HttpMethod::Post, "/agent/v0/batch"),
                descriptor(HttpMethod::Get, "/agent/v0/actionspack"),
                descriptor(HttpMethod::Post, "/agent/v0/app-logout"),
            ],
        }
    }
}

impl TryFrom<BTreeMap<String, RawEndpoint>> for EndpointTable {
    type Error = ConfigError;

    fn try_from(raw: BTreeMap<String, RawEndpoint>) -> Result<Self, Self::Error> {
        Self::from_entries(raw.into_iter().map(|(name, e)| (name, e.method, e.path)))
    }
}

fn validate(endpoint: Endpoint, method: HttpMethod, path: &str) -> Result<(), ConfigError> {
    if method != endpoint.wire_method() {
        return Err(ConfigError::MethodMismatch {
            endpoint: endpoint.name(),
            expected: endpoint.wire_method().as_str(),
            found: method.as_str(),
        });
    }
    if !path.starts_with('/') {
        return Err(ConfigError::InvalidPath {
            endpoint: endpoint.name(),
            path: path.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_entries() -> Vec<(&'static str, &'static str, String)> {
        EndpointTable::default()
            .iter()
            .map(|(e, d)| (e.name(), d.method.as_str(), d.path.clone()))
            .collect()
    }

    #[test]
    fn default_table_uses_wire_methods() {
        let table = EndpointTable::default();
        for (endpoint, descriptor) in table.iter() {
            assert_eq!(descriptor.method, endpoint.wire_method(), "{endpoint:?}");
            assert!(descriptor.path.starts_with('/'));
        }
        assert_eq!(table.get(Endpoint::ActionsPack).method, HttpMethod::Get);
    }

    #[test]
    fn from_entries_roundtrips_default() {
        let table = EndpointTable::from_entries(default_entries()).unwrap();
        assert_eq!(table, EndpointTable::default());
    }

    #[test]
    fn protocol_names_are_accepted() {
        assert_eq!(Endpoint::from_name("AppBeat"), Some(Endpoint::AppBeat));
        assert_eq!(Endpoint::from_name("app_beat"), Some(Endpoint::AppBeat));
        assert_eq!(Endpoint::from_name("beat"), None);
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let entries: Vec<_> = default_entries()
            .into_iter()
            .filter(|(name, _, _)| *name != "app_logout")
            .collect();
        let err = EndpointTable::from_entries(entries).unwrap_err();
        assert_eq!(err, ConfigError::MissingEndpoint("app_logout"));
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let mut entries = default_entries();
        entries.push(("rules_pack", "GET", "/rulespack".to_string()));
        let err = EndpointTable::from_entries(entries).unwrap_err();
        assert_eq!(err, ConfigError::UnknownEndpoint("rules_pack".to_string()));
    }

    #[test]
    fn duplicate_endpoint_is_rejected() {
        let mut entries = default_entries();
        entries.push(("batch", "POST", "/other-batch".to_string()));
        let err = EndpointTable::from_entries(entries).unwrap_err();
        assert_eq!(err, ConfigError::DuplicateEndpoint("batch"));
    }

    #[test]
    fn wrong_method_is_rejected() {
        let entries: Vec<_> = default_entries()
            .into_iter()
            .map(|(name, method, path)| {
                if name == "actions_pack" {
                    (name, "POST", path)
                } else {
                    (name, method, path)
                }
            })
            .collect();
        let err = EndpointTable::from_entries(entries).unwrap_err();
        assert!(matches!(err, ConfigError::MethodMismatch { endpoint: "actions_pack", .. }));
    }

    #[test]
    fn unparseable_method_is_rejected() {
        let entries: Vec<_> = default_entries()
            .into_iter()
            .map(|(name, method, path)| if name == "batch" { (name, "SEND", path) } else { (name, method, path) })
            .collect();
        let err = EndpointTable::from_entries(entries).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMethod { endpoint: "batch", .. }));
    }

    #[test]
    fn relative_path_is_rejected() {
        let entries: Vec<_> = default_entries()
            .into_iter()
            .map(|(name, method, path)| {
                if name == "app_beat" {
                    (name, method, "app-beat".to_string())
                } else {
                    (name, method, path)
                }
            })
            .collect();
        let err = EndpointTable::from_entries(entries).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPath { endpoint: "app_beat", .. }));
    }

    #[test]
    fn from_json_parses_full_table() {
        let json = r#"{
            "app_login":    {"method": "POST", "path": "/v2/login"},
            "app_beat":     {"method": "POST", "path": "/v2/beat"},
            "batch":        {"method": "POST", "path": "/v2/batch"},
            "actions_pack": {"method": "GET",  "path": "/v2/actions"},
            "app_logout":   {"method": "POST", "path": "/v2/logout"}
        }"#;
        let table = EndpointTable::from_json(json).unwrap();
        assert_eq!(table.get(Endpoint::AppLogin).path, "/v2/login");
        assert_eq!(table.get(Endpoint::ActionsPack).method, HttpMethod::Get);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        let err = EndpointTable::from_json("{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
