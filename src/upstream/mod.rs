//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Execution engine, at the trigger transformer:
//!     → dispatcher (client.rs): one buffered call, body decoded by the codec
//!         → status/headers propagated onto the client response
//!         → decoded body becomes the working body
//!     → passthrough (passthrough.rs): request re-streamed, response streamed
//!         back untouched, engine stops
//!
//! Unmatched routes:
//!     → passthrough (raw inbound body, no parsing)
//! ```
//!
//! # Design Decisions
//! - Both seams are traits so the engine can run against fakes
//! - One pooled hyper client per process, shared by both paths
//! - No retries: an upstream failure fails that one execution

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, Response, StatusCode};
use thiserror::Error;

use crate::http::body::{Body, BodyError};
use crate::http::request::MoxRequest;

pub mod client;
pub mod passthrough;

pub use client::{build_client, HttpClient, HttpUpstream};
pub use passthrough::HttpPassThrough;

/// What the upstream answered, with the body already decoded.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// Errors that can occur while talking to the upstream.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Target base URL and request path do not form a valid URI.
    #[error("invalid upstream target: {0}")]
    InvalidTarget(String),

    /// Outbound request could not be assembled.
    #[error("failed to build upstream request: {0}")]
    Build(#[from] axum::http::Error),

    /// Connection refused, reset, or a malformed upstream response.
    #[error("upstream request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    /// Reading the upstream body failed or exceeded the size limit.
    #[error("failed to read upstream body: {0}")]
    Body(#[source] axum::Error),

    /// Request body could not be serialized.
    #[error(transparent)]
    Codec(#[from] BodyError),

    /// No answer within the configured deadline.
    #[error("upstream timed out after {0:?}")]
    Timeout(Duration),
}

/// Performs the single outbound call of an execution.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn dispatch(
        &self,
        target_url: &str,
        request: &MoxRequest,
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// Takes over an exchange entirely; the engine does not touch the response.
#[async_trait]
pub trait PassThrough: Send + Sync {
    async fn forward(&self, request: MoxRequest, target_url: &str) -> Response<AxumBody>;
}
