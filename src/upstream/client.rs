//! Upstream dispatcher.
//!
//! # Responsibilities
//! - Assemble the outbound request from the (possibly mutated) live request
//! - Omit `host` so it is recomputed for the target, fix `content-length`
//! - Enforce the per-call deadline and body size limit
//! - Decode the upstream body through the codec

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::body::{self, Body};
use crate::http::headers::strip_hop_by_hop;
use crate::http::request::MoxRequest;
use crate::observability::metrics;
use crate::upstream::{Upstream, UpstreamError, UpstreamResponse};

/// Pooled client shared by the dispatcher and the passthrough proxy.
pub type HttpClient = Client<HttpConnector, AxumBody>;

/// Build the process-wide HTTP client.
pub fn build_client() -> HttpClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Join a base URL and a request path the way the chain sees them.
pub fn join_target(target_url: &str, url: &str) -> Result<Uri, UpstreamError> {
    let joined = format!("{}{}", target_url.trim_end_matches('/'), url);
    joined
        .parse::<Uri>()
        .map_err(|e| UpstreamError::InvalidTarget(format!("{}: {}", joined, e)))
}

/// Assemble an outbound request.
///
/// The pooled client speaks HTTP/1.x to upstreams, so HTTP/1.0 is kept and
/// everything else is sent as HTTP/1.1.
pub fn outbound_request(
    target_url: &str,
    method: Method,
    version: Version,
    mut headers: HeaderMap,
    url: &str,
    body: AxumBody,
) -> Result<Request<AxumBody>, UpstreamError> {
    let uri = join_target(target_url, url)?;
    headers.remove(header::HOST);
    strip_hop_by_hop(&mut headers);

    let mut request = Request::builder()
        .method(method)
        .version(match version {
            Version::HTTP_10 => Version::HTTP_10,
            _ => Version::HTTP_11,
        })
        .uri(uri)
        .body(body)?;
    *request.headers_mut() = headers;
    Ok(request)
}

/// Dispatcher backed by the pooled hyper client.
#[derive(Clone)]
pub struct HttpUpstream {
    client: HttpClient,
    timeout: Duration,
    max_body_size: usize,
}

impl HttpUpstream {
    pub fn new(client: HttpClient, timeout: Duration, max_body_size: usize) -> Self {
        Self {
            client,
            timeout,
            max_body_size,
        }
    }

    async fn call(
        &self,
        target_url: &str,
        request: &MoxRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let payload = body::serialize_request_body(&request.method, &request.body)?;

        let mut headers = request.headers.clone();
        // Bodies come back identity-encoded; the codec cannot inflate.
        headers.remove(header::ACCEPT_ENCODING);
        headers.remove(header::TRANSFER_ENCODING);
        match &payload {
            Some(bytes) => {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
            }
            None => {
                headers.remove(header::CONTENT_LENGTH);
            }
        }

        let outbound = outbound_request(
            target_url,
            request.method.clone(),
            request.version,
            headers,
            &request.url,
            payload.map(AxumBody::from).unwrap_or_else(AxumBody::empty),
        )?;

        let response = self.client.request(outbound).await?;
        let (parts, incoming) = response.into_parts();
        let bytes = axum::body::to_bytes(AxumBody::new(incoming), self.max_body_size)
            .await
            .map_err(UpstreamError::Body)?;

        Ok(UpstreamResponse {
            status: parts.status,
            body: body::decode_response(&parts.headers, bytes),
            headers: parts.headers,
        })
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn dispatch(
        &self,
        target_url: &str,
        request: &MoxRequest,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let response = tokio::time::timeout(self.timeout, self.call(target_url, request))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))??;

        metrics::record_upstream(response.status.as_u16());
        tracing::debug!(
            target = %target_url,
            url = %request.url,
            status = %response.status,
            "Sent to upstream"
        );
        Ok(response)
    }
}
