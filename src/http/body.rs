//! Body codec.
//!
//! # Responsibilities
//! - Materialize inbound wire bodies into values transformers can inspect
//! - Re-serialize (possibly mutated) request bodies before forwarding
//! - Reinterpret upstream response bodies according to their content type
//! - Serialize the final working body for the original client
//!
//! # Design Decisions
//! - Only `application/json` is ever JSON-interpreted; `text/*` stays a string
//!   even when it happens to contain valid JSON
//! - Unrecognized content types are carried as raw bytes, never rejected
//! - Response-side JSON failures degrade to the raw string

use std::fmt;

use axum::http::{header, HeaderMap, HeaderValue, Method};
use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::http::request::MoxRequest;

/// A request or response body as seen by the pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body at all.
    #[default]
    Empty,
    /// A structured JSON value (object, array or primitive).
    Json(Value),
    /// A textual body, kept verbatim.
    Text(String),
    /// Bytes of a content type the codec does not understand.
    Raw(Bytes),
}

/// Errors raised while decoding or encoding a body.
#[derive(Debug, Error)]
pub enum BodyError {
    /// Declared `application/json` but the payload does not parse.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Declared `text/*` but the payload is not UTF-8.
    #[error("invalid text body: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

impl Body {
    /// An empty JSON object, used when a chain answers without the upstream.
    pub fn empty_object() -> Self {
        Body::Json(Value::Object(Map::new()))
    }

    /// Structured values are serialized as JSON when sent to the client.
    pub fn is_structured(&self) -> bool {
        matches!(self, Body::Json(v) if !v.is_string() && !v.is_null())
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(s) => Some(s),
            Body::Json(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Canonical wire form of this body.
    pub fn to_bytes(&self) -> Result<Bytes, BodyError> {
        Ok(match self {
            Body::Empty => Bytes::new(),
            Body::Json(v) => Bytes::from(serde_json::to_vec(v)?),
            Body::Text(s) => Bytes::from(s.clone()),
            Body::Raw(b) => b.clone(),
        })
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Body::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Text(value.to_string())
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Raw(value)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "<empty>"),
            Body::Json(v) => write!(f, "{}", v),
            Body::Text(s) => write!(f, "{}", s),
            Body::Raw(b) => write!(f, "<{} raw bytes>", b.len()),
        }
    }
}

/// Media type of a `content-type` header, lower-cased and without parameters.
pub fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or("").trim();
    if essence.is_empty() {
        None
    } else {
        Some(essence.to_ascii_lowercase())
    }
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json"
}

fn is_text(media_type: &str) -> bool {
    media_type.starts_with("text/")
}

/// Decode an inbound request body according to its declared content type.
///
/// Only `Raw` and `Empty` bodies are decoded; a body that is already
/// structured is returned untouched.
pub fn decode_request(headers: &HeaderMap, body: Body) -> Result<Body, BodyError> {
    let bytes = match body {
        Body::Raw(bytes) => bytes,
        Body::Empty => Bytes::new(),
        decoded => return Ok(decoded),
    };

    match media_type(headers) {
        Some(mt) if is_json(&mt) => {
            if bytes.is_empty() {
                Ok(Body::empty_object())
            } else {
                Ok(Body::Json(serde_json::from_slice(&bytes)?))
            }
        }
        Some(mt) if is_text(&mt) => Ok(Body::Text(String::from_utf8(bytes.to_vec())?)),
        other => {
            match other {
                Some(mt) => tracing::warn!(content_type = %mt, "Skipping body parsing for content-type"),
                None if !bytes.is_empty() => {
                    tracing::warn!(len = bytes.len(), "Skipping body parsing, no content-type declared")
                }
                None => {}
            }
            if bytes.is_empty() {
                Ok(Body::Empty)
            } else {
                Ok(Body::Raw(bytes))
            }
        }
    }
}

/// Whether a request carries a body worth forwarding.
///
/// GET and HEAD are normally bodiless on the wire, so for them only a
/// non-empty value counts; `{}` and `[]` do not.
pub fn has_body(method: &Method, body: &Body) -> bool {
    match body {
        Body::Empty | Body::Json(Value::Null) => false,
        _ if method != Method::GET && method != Method::HEAD => true,
        Body::Json(Value::Object(map)) => !map.is_empty(),
        Body::Json(Value::Array(items)) => !items.is_empty(),
        Body::Json(Value::String(s)) | Body::Text(s) => !s.is_empty(),
        Body::Json(_) => true,
        Body::Raw(bytes) => !bytes.is_empty(),
    }
}

/// Serialized request body, or `None` when the request is bodiless.
pub fn serialize_request_body(method: &Method, body: &Body) -> Result<Option<Bytes>, BodyError> {
    if !has_body(method, body) {
        return Ok(None);
    }
    match body {
        Body::Json(Value::String(s)) => Ok(Some(Bytes::from(s.clone()))),
        other => other.to_bytes().map(Some),
    }
}

/// Prepare a request for full passthrough.
///
/// Recomputes the canonical body and corrects `content-length` so it
/// never describes a body from before the chain mutated it.
pub fn restream(request: &mut MoxRequest) -> Result<Option<Bytes>, BodyError> {
    let content = serialize_request_body(&request.method, &request.body)?;
    request.headers.remove(header::TRANSFER_ENCODING);
    match &content {
        Some(bytes) => {
            let length = HeaderValue::from(bytes.len());
            if request.headers.get(header::CONTENT_LENGTH) != Some(&length) {
                request.headers.insert(header::CONTENT_LENGTH, length);
            }
        }
        None => {
            request.headers.remove(header::CONTENT_LENGTH);
        }
    }
    Ok(content)
}

/// Interpret an upstream response body.
///
/// Text is reinterpreted as JSON only when the upstream declared
/// `application/json`; a body that claims JSON but fails to parse is kept
/// as the raw string.
pub fn decode_response(headers: &HeaderMap, bytes: Bytes) -> Body {
    let text = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(_) => return Body::Raw(bytes),
    };

    if media_type(headers).is_some_and(|mt| is_json(&mt)) {
        match serde_json::from_str(&text) {
            Ok(value) => return Body::Json(value),
            Err(e) => tracing::debug!(error = %e, "Upstream body is not valid JSON, keeping text"),
        }
    }
    Body::Text(text)
}

/// Encode the final working body for the client.
///
/// Returns the payload and the content type to use when none is set yet.
pub fn encode_response(body: &Body) -> Result<(Bytes, Option<&'static str>), BodyError> {
    Ok(match body {
        Body::Empty | Body::Json(Value::Null) => (Bytes::new(), None),
        Body::Json(Value::String(s)) => (Bytes::from(s.clone()), Some("text/plain; charset=utf-8")),
        Body::Json(v) => (Bytes::from(serde_json::to_vec(v)?), Some("application/json")),
        Body::Text(s) => (Bytes::from(s.clone()), Some("text/plain; charset=utf-8")),
        Body::Raw(b) => (b.clone(), Some("application/octet-stream")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    fn raw(s: &str) -> Body {
        Body::Raw(Bytes::from(s.to_string()))
    }

    #[test]
    fn test_media_type_strips_parameters() {
        assert_eq!(
            media_type(&headers("Application/JSON; charset=utf-8")).as_deref(),
            Some("application/json")
        );
        assert_eq!(media_type(&HeaderMap::new()), None);
    }

    #[test]
    fn test_decode_json_request() {
        let body = decode_request(&headers("application/json"), raw(r#"{"foo":"bar"}"#)).unwrap();
        assert_eq!(body, Body::Json(json!({ "foo": "bar" })));

        let body = decode_request(&headers("application/json"), raw("[]")).unwrap();
        assert_eq!(body, Body::Json(json!([])));

        let body = decode_request(&headers("application/json"), Body::Empty).unwrap();
        assert_eq!(body, Body::empty_object());
    }

    #[test]
    fn test_text_that_looks_like_json_stays_text() {
        let body = decode_request(&headers("text/plain"), raw(r#"{"foo":"bar"}"#)).unwrap();
        assert_eq!(body, Body::Text(r#"{"foo":"bar"}"#.to_string()));
    }

    #[test]
    fn test_invalid_json_request_is_an_error() {
        let err = decode_request(&headers("application/json"), raw("{nope")).unwrap_err();
        assert!(matches!(err, BodyError::InvalidJson(_)));
    }

    #[test]
    fn test_unrecognized_content_type_is_raw() {
        let body = decode_request(&headers("application/octet-stream"), raw("\u{1}\u{2}")).unwrap();
        assert_eq!(body, raw("\u{1}\u{2}"));

        let body = decode_request(&HeaderMap::new(), Body::Empty).unwrap();
        assert_eq!(body, Body::Empty);
    }

    #[test]
    fn test_already_decoded_body_is_kept() {
        let body = decode_request(&headers("text/plain"), Body::Json(json!([1]))).unwrap();
        assert_eq!(body, Body::Json(json!([1])));
    }

    #[test]
    fn test_has_body_depends_on_method() {
        for empty in [Body::Json(json!({})), Body::Json(json!([])), Body::Text(String::new())] {
            assert!(!has_body(&Method::GET, &empty));
            assert!(!has_body(&Method::HEAD, &empty));
            assert!(has_body(&Method::POST, &empty));
        }
        assert!(has_body(&Method::GET, &Body::Json(json!([1]))));
        assert!(has_body(&Method::GET, &Body::Json(json!({ "a": 1 }))));
        assert!(!has_body(&Method::POST, &Body::Empty));
        assert!(!has_body(&Method::PUT, &Body::Json(Value::Null)));
    }

    #[test]
    fn test_restream_corrects_content_length() {
        let mut request = MoxRequest::new(Method::POST, "/echo");
        request.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(2usize));
        request.headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        request.body = Body::Json(json!({ "foo": "bar", "extra": "property" }));

        let bytes = restream(&mut request).unwrap().unwrap();
        assert_eq!(
            request.headers.get(header::CONTENT_LENGTH).unwrap(),
            &HeaderValue::from(bytes.len())
        );
        assert!(request.headers.get(header::TRANSFER_ENCODING).is_none());
    }

    #[test]
    fn test_restream_empty_get_body_is_dropped() {
        let mut request = MoxRequest::new(Method::GET, "/things");
        request.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(2usize));
        request.body = Body::Json(json!({}));

        assert!(restream(&mut request).unwrap().is_none());
        assert!(request.headers.get(header::CONTENT_LENGTH).is_none());

        let mut request = MoxRequest::new(Method::POST, "/things");
        request.body = Body::Json(json!([]));
        assert_eq!(restream(&mut request).unwrap().unwrap(), Bytes::from_static(b"[]"));
    }

    #[test]
    fn test_decode_response_gated_on_content_type() {
        let json_body = Bytes::from_static(br#"{"message":"looks like json"}"#);
        assert_eq!(
            decode_response(&headers("application/json; charset=utf-8"), json_body.clone()),
            Body::Json(json!({ "message": "looks like json" }))
        );
        assert_eq!(
            decode_response(&headers("text/plain"), json_body),
            Body::Text(r#"{"message":"looks like json"}"#.to_string())
        );
    }

    #[test]
    fn test_decode_response_falls_back_to_text() {
        let body = decode_response(&headers("application/json"), Bytes::from_static(b"oops"));
        assert_eq!(body, Body::Text("oops".to_string()));

        let body = decode_response(&HeaderMap::new(), Bytes::from_static(&[0xff, 0xfe]));
        assert_eq!(body, Body::Raw(Bytes::from_static(&[0xff, 0xfe])));
    }

    #[test]
    fn test_encode_response() {
        let (bytes, ct) = encode_response(&Body::Json(json!({ "num": 101 }))).unwrap();
        assert_eq!(bytes, Bytes::from_static(br#"{"num":101}"#));
        assert_eq!(ct, Some("application/json"));

        let (bytes, ct) = encode_response(&Body::Text("hi".into())).unwrap();
        assert_eq!(bytes, Bytes::from_static(b"hi"));
        assert_eq!(ct, Some("text/plain; charset=utf-8"));

        let (bytes, ct) = encode_response(&Body::Json(Value::Null)).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(ct, None);
    }
}
