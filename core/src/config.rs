//! Client configuration.
//!
//! # Design
//! `ClientConfig` is plain serde data so it can be embedded in the agent's
//! own configuration file, and it can also be read from `AGENT_BACKEND_*`
//! environment variables. Validation happens once, when the client is built;
//! a client that was constructed successfully never hits a configuration
//! error at call time.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::endpoint::EndpointTable;
use crate::error::ConfigError;
use crate::protocol::is_reserved_header;
use crate::transport::{ProxyMode, TransportOptions};

pub const ENV_URL: &str = "AGENT_BACKEND_URL";
pub const ENV_PROXY: &str = "AGENT_BACKEND_PROXY";
pub const ENV_TIMEOUT_SECS: &str = "AGENT_BACKEND_TIMEOUT_SECS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "AGENT_BACKEND_CONNECT_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub endpoints: EndpointTable,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Proxy URL. `"direct"` disables proxying; unset falls back to the
    /// standard proxy environment variables.
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    /// Extra headers sent with every request.
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            endpoints: EndpointTable::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            proxy: None,
            user_agent: None,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by the `AGENT_BACKEND_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.base_url = url;
        }
        if let Some(proxy) = lookup(ENV_PROXY) {
            config.proxy = Some(proxy);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = parse_secs(ENV_TIMEOUT_SECS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_CONNECT_TIMEOUT_SECS) {
            config.connect_timeout_secs = parse_secs(ENV_CONNECT_TIMEOUT_SECS, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject a base URL that is not absolute http(s), an unparseable proxy
    /// URL, and extra headers that would shadow the ones the client sets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        if let ProxyMode::Url(proxy) = self.proxy_mode() {
            Url::parse(&proxy).map_err(|e| ConfigError::InvalidProxy {
                url: proxy.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(name) = self.headers.keys().find(|name| is_reserved_header(name)) {
            return Err(ConfigError::ReservedHeader(name.clone()));
        }
        Ok(())
    }

    pub fn proxy_mode(&self) -> ProxyMode {
        match self.proxy.as_deref().map(str::trim) {
            None | Some("") => ProxyMode::FromEnv,
            Some(p) if p.eq_ignore_ascii_case("direct") || p.eq_ignore_ascii_case("none") => ProxyMode::Direct,
            Some(p) => ProxyMode::Url(p.to_string()),
        }
    }

    pub fn transport_options(&self) -> TransportOptions {
        TransportOptions {
            timeout: non_zero_secs(self.timeout_secs),
            connect_timeout: non_zero_secs(self.connect_timeout_secs),
            proxy: self.proxy_mode(),
        }
    }

    pub fn extra_headers(&self) -> Vec<(String, String)> {
        self.headers.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

/// Zero disables the timeout.
fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key: &str| vars.iter().find(|(k, _)| *k == key).map(|(_, v)| v.to_string())
    }

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.proxy_mode(), ProxyMode::FromEnv);
        assert_eq!(config.transport_options().timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (ENV_URL, "https://backend.example.com"),
            (ENV_PROXY, "http://proxy.internal:3128"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_CONNECT_TIMEOUT_SECS, "0"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://backend.example.com");
        assert_eq!(
            config.proxy_mode(),
            ProxyMode::Url("http://proxy.internal:3128".to_string())
        );
        let options = config.transport_options();
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.connect_timeout, None);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: ENV_TIMEOUT_SECS,
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let err = ClientConfig::from_lookup(lookup(&[(ENV_URL, "backend without scheme")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

        let err = ClientConfig::new("ftp://backend.example.com").validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));
    }

    #[test]
    fn direct_proxy_disables_env_lookup() {
        let mut config = ClientConfig::default();
        config.proxy = Some("direct".to_string());
        assert_eq!(config.proxy_mode(), ProxyMode::Direct);
    }

    #[test]
    fn reserved_headers_are_rejected() {
        for name in ["X-Session-Id", "x-token", "X-APP-NAME", "content-type", "User-Agent"] {
            let mut config = ClientConfig::default();
            config.headers.insert(name.to_string(), "SPOOF".to_string());
            assert_eq!(
                config.validate().unwrap_err(),
                ConfigError::ReservedHeader(name.to_string()),
                "{name}"
            );
        }

        let err = ClientConfig::from_json(r#"{"headers": {"X-Session-Id": "SPOOF"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ReservedHeader(_)));
    }

    #[test]
    fn from_json_with_partial_fields() {
        let config = ClientConfig::from_json(
            r#"{
                "base_url": "https://backend.example.com",
                "headers": {"X-Agent-Host": "web-1"},
                "endpoints": {
                    "app_login":    {"method": "POST", "path": "/v2/login"},
                    "app_beat":     {"method": "POST", "path": "/v2/beat"},
                    "batch":        {"method": "POST", "path": "/v2/batch"},
                    "actions_pack": {"method": "GET",  "path": "/v2/actions"},
                    "app_logout":   {"method": "POST", "path": "/v2/logout"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.endpoints.get(Endpoint::AppBeat).path, "/v2/beat");
        assert_eq!(
            config.extra_headers(),
            vec![("X-Agent-Host".to_string(), "web-1".to_string())]
        );
    }

    #[test]
    fn from_json_rejects_incomplete_endpoint_table() {
        let err = ClientConfig::from_json(
            r#"{"endpoints": {"app_login": {"method": "POST", "path": "/login"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(msg) if msg.contains("missing endpoint")));
    }
}
