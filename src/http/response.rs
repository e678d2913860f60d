//! Response handling toward the original client.
//!
//! # Responsibilities
//! - Hold the outbound status and headers a chain may edit
//! - Absorb upstream status/headers before response-phase transformers run
//! - Serialize the final working body and write it exactly once
//! - Optional weak ETag validation for pipeline-written responses
//!
//! # Design Decisions
//! - Length and encoding headers are never inherited; the body is re-encoded
//! - Content type defaults only apply when nothing set one already

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use axum::body::Body as AxumBody;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use bytes::Bytes;

use crate::http::body::{encode_response, Body, BodyError};
use crate::http::headers::{strip_body_framing, strip_hop_by_hop};

/// Status and headers of the response being built for the client.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
        }
    }
}

impl ResponseHead {
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Copy the upstream status and headers onto this response.
    ///
    /// Headers present upstream replace local ones of the same name; framing
    /// and hop-by-hop headers are dropped since the body will be re-encoded.
    pub fn propagate(&mut self, status: StatusCode, upstream: &HeaderMap) {
        let mut inherited = upstream.clone();
        strip_hop_by_hop(&mut inherited);
        strip_body_framing(&mut inherited);

        for name in inherited.keys() {
            self.headers.remove(name);
        }
        for (name, value) in inherited.iter() {
            self.headers.append(name.clone(), value.clone());
        }
        self.status = status;
    }
}

/// Write the final body to the client.
///
/// `validators` carries the request headers when ETag generation is
/// enabled; a matching `if-none-match` turns the answer into a 304.
pub fn send_to_client(
    mut head: ResponseHead,
    body: &Body,
    validators: Option<&HeaderMap>,
) -> Result<Response<AxumBody>, BodyError> {
    strip_body_framing(&mut head.headers);
    let (bytes, content_type) = encode_response(body)?;

    if let Some(content_type) = content_type {
        head.headers
            .entry(header::CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type));
    }

    if let Some(request_headers) = validators {
        if head.status.is_success() && !head.headers.contains_key(header::ETAG) {
            let etag = weak_etag(&bytes);
            let fresh = request_headers
                .get(header::IF_NONE_MATCH)
                .is_some_and(|candidate| *candidate == etag);
            head.headers.insert(header::ETAG, etag);
            if fresh {
                head.status = StatusCode::NOT_MODIFIED;
                head.headers.remove(header::CONTENT_TYPE);
                return Ok(build(head, Bytes::new()));
            }
        }
    }

    Ok(build(head, bytes))
}

fn build(head: ResponseHead, bytes: Bytes) -> Response<AxumBody> {
    let mut response = Response::new(AxumBody::from(bytes));
    *response.status_mut() = head.status;
    *response.headers_mut() = head.headers;
    response
}

fn weak_etag(bytes: &Bytes) -> HeaderValue {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    let tag = format!("W/\"{:x}-{:x}\"", bytes.len(), hasher.finish());
    // Only hex digits and fixed punctuation, always a valid header value.
    HeaderValue::from_str(&tag).unwrap_or_else(|_| HeaderValue::from_static("W/\"0\""))
}
