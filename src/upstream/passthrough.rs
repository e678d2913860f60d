//! Full passthrough proxy.
//!
//! # Responsibilities
//! - Forward an exchange to the upstream and stream its answer back
//! - Re-stream a body the chain may have mutated, with a corrected length
//! - Own the client response completely, including upstream failures
//!
//! # Design Decisions
//! - Change-origin: `host` is dropped so the client derives it from the target
//! - Response bodies are streamed, never buffered
//! - Upstream failures become 502 here; nothing propagates to the engine

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use axum::http::{Request, Response, StatusCode};
use axum::response::IntoResponse;

use crate::http::body;
use crate::http::headers::strip_hop_by_hop;
use crate::http::request::MoxRequest;
use crate::observability::metrics;
use crate::upstream::client::{outbound_request, HttpClient};
use crate::upstream::{PassThrough, UpstreamError};

/// Passthrough backed by the pooled hyper client.
#[derive(Clone)]
pub struct HttpPassThrough {
    client: HttpClient,
    timeout: Duration,
}

impl HttpPassThrough {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Forward an inbound request that matched no route, body untouched.
    pub async fn forward_raw(&self, request: Request<AxumBody>, target_url: &str) -> Response<AxumBody> {
        let (parts, body) = request.into_parts();
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        tracing::debug!(method = %parts.method, url = %url, target = %target_url, "Proxying unmatched route");
        let result = self
            .send(target_url, parts.method, parts.version, parts.headers, &url, body)
            .await;
        self.finish(result, &url)
    }

    async fn send(
        &self,
        target_url: &str,
        method: axum::http::Method,
        version: axum::http::Version,
        headers: axum::http::HeaderMap,
        url: &str,
        body: AxumBody,
    ) -> Result<Response<AxumBody>, UpstreamError> {
        let outbound = outbound_request(target_url, method, version, headers, url, body)?;
        let response = tokio::time::timeout(self.timeout, self.client.request(outbound))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))??;

        metrics::record_upstream(response.status().as_u16());
        let (mut parts, incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, AxumBody::new(incoming)))
    }

    fn finish(&self, result: Result<Response<AxumBody>, UpstreamError>, url: &str) -> Response<AxumBody> {
        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "An error occurred in passthrough proxy");
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

#[async_trait]
impl PassThrough for HttpPassThrough {
    async fn forward(&self, mut request: MoxRequest, target_url: &str) -> Response<AxumBody> {
        tracing::debug!(url = %request.url, target = %target_url, "Pass-through");
        let buffer = match body::restream(&mut request) {
            Ok(buffer) => buffer,
            Err(e) => return self.finish(Err(e.into()), &request.url),
        };
        let body = buffer.map(AxumBody::from).unwrap_or_else(AxumBody::empty);

        let result = self
            .send(
                target_url,
                request.method.clone(),
                request.version,
                request.headers.clone(),
                &request.url,
                body,
            )
            .await;
        self.finish(result, &request.url)
    }
}
