//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check every proxy rule compiles
//! - Check define keys and plugin names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;
use crate::define::is_valid_key;
use crate::error::RouteError;
use crate::routing::Rule;

/// A single semantic problem in the configuration.
#[derive(Debug)]
pub enum ValidationError {
    BindAddress { field: &'static str, value: String },
    ZeroTimeout(&'static str),
    EmptyPluginName(usize),
    DefineKey(String),
    Rule { index: usize, prefix: String, error: RouteError },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::BindAddress { field, value } => {
                write!(f, "{} is not a socket address: {:?}", field, value)
            }
            ValidationError::ZeroTimeout(field) => write!(f, "timeouts.{} must be greater than 0", field),
            ValidationError::EmptyPluginName(i) => write!(f, "plugins[{}] is empty", i),
            ValidationError::DefineKey(key) => write!(f, "define key {:?} is not an identifier", key),
            ValidationError::Rule { index, prefix, error } => {
                write!(f, "proxy[{}] ({}): {}", index, prefix, error)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress {
            field: "server.bind_address",
            value: config.server.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::BindAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    for (i, plugin) in config.plugins.iter().enumerate() {
        if plugin.trim().is_empty() {
            errors.push(ValidationError::EmptyPluginName(i));
        }
    }

    for key in config.define.keys() {
        if !is_valid_key(key) {
            errors.push(ValidationError::DefineKey(key.clone()));
        }
    }

    for (index, rule) in config.proxy.iter().enumerate() {
        if let Err(error) = Rule::from_config(rule) {
            errors.push(ValidationError::Rule {
                index,
                prefix: rule.prefix.clone(),
                error,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
