//! Request representation handed to the pipeline.
//!
//! # Responsibilities
//! - Own the live, mutable request a chain may rewrite
//! - Expose routing-relevant information (path, query, params)
//! - Carry the request ID assigned at the edge for log correlation
//!
//! # Design Decisions
//! - The body is buffered once at the edge; decoding happens in the engine
//! - Header names are lower case by construction (`HeaderName` normalizes)
//! - `original_url` is preserved for logging; `url` is what gets forwarded

use std::collections::HashMap;

use axum::http::{header, request::Parts, HeaderMap, HeaderValue, Method, Version};
use bytes::Bytes;

use crate::http::body::Body;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request a chain operates on.
#[derive(Debug, Clone)]
pub struct MoxRequest {
    pub method: Method,
    pub version: Version,
    /// Path and query forwarded to the upstream; `goto` rewrites it.
    pub url: String,
    /// URL as received from the client.
    pub original_url: String,
    pub headers: HeaderMap,
    /// Captures from the route pattern (`:name` and `*` segments).
    pub params: HashMap<String, String>,
    pub body: Body,
}

impl MoxRequest {
    /// Create a bodiless request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            method,
            version: Version::HTTP_11,
            original_url: url.clone(),
            url,
            headers: HeaderMap::new(),
            params: HashMap::new(),
            body: Body::Empty,
        }
    }

    /// Build from the parts of an inbound request and its buffered body.
    pub fn from_parts(parts: Parts, body: Bytes) -> Self {
        let url = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        Self {
            method: parts.method,
            version: parts.version,
            original_url: url.clone(),
            url,
            headers: parts.headers,
            params: HashMap::new(),
            body: if body.is_empty() { Body::Empty } else { Body::Raw(body) },
        }
    }

    /// Attach a header, replacing any previous value.
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a wire body with its content type.
    pub fn with_body(mut self, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        let bytes = body.into();
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        self.body = Body::Raw(bytes);
        self
    }

    /// Path component of the current URL.
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or("/")
    }

    /// Query parameters of the current URL.
    pub fn query(&self) -> HashMap<String, String> {
        match self.url.split_once('?') {
            Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
            None => HashMap::new(),
        }
    }

    /// A header value as a string, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request ID assigned at the edge, or a fresh one.
    pub fn request_id(&self) -> String {
        self.header(X_REQUEST_ID)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}
