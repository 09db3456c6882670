//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the dev proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Backend used by the standard rule set.
pub const DEFAULT_BACKEND: &str = "http://localhost:8080";

/// Root configuration for the dev proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Framework integration plugins to activate. Opaque names.
    pub plugins: Vec<String>,

    /// Build-time constants: identifier → replacement expression.
    pub define: BTreeMap<String, String>,

    /// Listener and static file settings.
    pub server: ServerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Proxy rules, in precedence order.
    pub proxy: Vec<ProxyRuleConfig>,
}

impl ProxyConfig {
    /// The stock setup: a WebSocket passthrough on `/ws` and a REST API on
    /// `/api` with the prefix stripped, both against the local backend.
    pub fn standard() -> Self {
        let mut define = BTreeMap::new();
        define.insert("global".to_string(), "globalThis".to_string());

        Self {
            plugins: vec!["vue".to_string()],
            define,
            proxy: vec![
                ProxyRuleConfig {
                    ws: true,
                    ..ProxyRuleConfig::new("/ws", DEFAULT_BACKEND)
                },
                ProxyRuleConfig {
                    change_origin: true,
                    rewrite: Some(RewriteConfig::StripPrefix { prefix: None }),
                    ..ProxyRuleConfig::new("/api", DEFAULT_BACKEND)
                },
            ],
            ..Self::default()
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:5173").
    pub bind_address: String,

    /// Directory served for requests no proxy rule matches.
    pub root: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5173".to_string(),
            root: Some(PathBuf::from("public")),
        }
    }
}

/// A single proxy rule.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyRuleConfig {
    /// Literal path prefix to match.
    pub prefix: String,

    /// Base URL requests are forwarded to.
    pub target: String,

    /// Forward WebSocket upgrades.
    #[serde(default)]
    pub ws: bool,

    /// Rewrite the Host header to the target's authority.
    #[serde(default)]
    pub change_origin: bool,

    /// Path rewrite applied before forwarding.
    #[serde(default)]
    pub rewrite: Option<RewriteConfig>,
}

impl ProxyRuleConfig {
    pub fn new(prefix: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            target: target.into(),
            ws: false,
            change_origin: false,
            rewrite: None,
        }
    }
}

/// Path rewrite strategies available from configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum RewriteConfig {
    /// Strip a leading prefix. Defaults to the rule's own prefix.
    StripPrefix {
        #[serde(default)]
        prefix: Option<String>,
    },
    /// Replace the first match of a regular expression.
    Regex {
        pattern: String,
        #[serde(default)]
        replacement: String,
    },
}

/// Timeout configuration for upstream traffic.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
