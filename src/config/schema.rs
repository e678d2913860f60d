//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the mock server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the mock server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MoxConfig {
    /// Upstream base URL every chain starts with (e.g., "http://localhost:3000").
    pub target_url: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Forward requests that match no registered route straight to the upstream.
    pub proxy_unmatched_routes: bool,

    /// Skip ETag generation on responses written by a pipeline.
    pub disable_etag: bool,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Declarative route definitions registered at startup.
    pub routes: Vec<RouteConfig>,
}

impl Default for MoxConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:3000".to_string(),
            listener: ListenerConfig::default(),
            proxy_unmatched_routes: true,
            disable_etag: true,
            timeouts: TimeoutConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
            routes: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3005").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3005".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a single upstream call in seconds.
    pub upstream_secs: u64,

    /// Deadline for one whole pipeline execution in seconds.
    pub execution_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            upstream_secs: 30,
            execution_secs: 60,
        }
    }
}

/// Body size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound or upstream body size in bytes.
    pub max_body_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A route declared in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// HTTP method to bind ("GET", "POST", ... or "ALL").
    #[serde(default = "default_method")]
    pub method: String,

    /// Express-style path pattern (e.g., "/api/users/:id", "/*/array").
    pub path: String,

    /// Chain steps, applied in order.
    #[serde(default)]
    pub steps: Vec<StepConfig>,
}

fn default_method() -> String {
    "ALL".to_string()
}

/// One step of a declared chain. Each maps to a single builder operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepConfig {
    /// Suspend for `ms` milliseconds.
    Delay { ms: u64 },
    /// Log the request or response.
    Log {
        #[serde(default)]
        hide_headers: bool,
    },
    /// Rewrite the request path.
    Goto { path: String },
    /// Change the upstream base URL.
    SetBase { url: String },
    /// Set the response status code.
    Status { code: u16 },
    /// Set a response header.
    Header { name: String, value: String },
    /// Answer with a canned body, never contacting the upstream.
    Mock {
        #[serde(default)]
        body: serde_json::Value,
        #[serde(default)]
        status: Option<u16>,
    },
    /// Force an upstream call.
    Send,
}
