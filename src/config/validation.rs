//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the upstream base URL and listener address
//! - Validate value ranges (timeouts > 0, status codes, methods)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: MoxConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;
use url::Url;

use crate::config::schema::{MoxConfig, StepConfig};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a whole configuration, collecting every error.
pub fn validate_config(config: &MoxConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(message) = validate_base_url(&config.target_url) {
        errors.push(ValidationError::new("target_url", message));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be > 0"));
    }
    if config.timeouts.execution_secs == 0 {
        errors.push(ValidationError::new("timeouts.execution_secs", "must be > 0"));
    }
    if config.limits.max_body_size == 0 {
        errors.push(ValidationError::new("limits.max_body_size", "must be > 0"));
    }

    for (i, route) in config.routes.iter().enumerate() {
        let prefix = format!("routes[{}]", i);
        if !route.method.eq_ignore_ascii_case("ALL")
            && Method::from_bytes(route.method.to_ascii_uppercase().as_bytes()).is_err()
        {
            errors.push(ValidationError::new(
                format!("{}.method", prefix),
                format!("unknown method '{}'", route.method),
            ));
        }
        if !route.path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.path", prefix),
                "must start with '/'",
            ));
        }
        for (j, step) in route.steps.iter().enumerate() {
            if let Err(message) = validate_step(step) {
                errors.push(ValidationError::new(
                    format!("{}.steps[{}]", prefix, j),
                    message,
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Upstream base URLs must be plain `http://host[:port][/prefix]`.
pub fn validate_base_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    Ok(())
}

fn validate_step(step: &StepConfig) -> Result<(), String> {
    match step {
        StepConfig::Status { code } | StepConfig::Mock { status: Some(code), .. } => {
            StatusCode::from_u16(*code)
                .map(|_| ())
                .map_err(|_| format!("invalid status code {}", code))
        }
        StepConfig::Goto { path } if !path.starts_with('/') => {
            Err(format!("goto path '{}' must start with '/'", path))
        }
        StepConfig::SetBase { url } => validate_base_url(url),
        StepConfig::Header { name, value } => {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| format!("invalid header name '{}'", name))?;
            HeaderValue::from_str(value)
                .map_err(|_| format!("invalid header value for '{}'", name))?;
            Ok(())
        }
        _ => Ok(()),
    }
}
