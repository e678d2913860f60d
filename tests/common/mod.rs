//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use mox::{MoxConfig, MoxRouter, MoxServer, Shutdown};

#[derive(Clone)]
struct BackendInfo {
    name: &'static str,
    port: u16,
}

/// Start a scripted backend on an ephemeral port.
///
/// Routes match on path suffixes so any version prefix works
/// (`/1/array`, `/api/array`, ...).
pub async fn start_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(backend).with_state(BackendInfo {
        name,
        port: addr.port(),
    });
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// A port nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn backend(State(info): State<BackendInfo>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let path = parts.uri.path();
    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match parts.method {
        Method::GET => get_route(&info, path, &parts.headers),
        Method::POST => post_route(path, content_type, &bytes),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn get_route(info: &BackendInfo, path: &str, headers: &HeaderMap) -> Response {
    let segments: Vec<&str> = path.split('/').collect();
    if path.ends_with("/array") {
        Json(json!(["foo", "bar", "baz"])).into_response()
    } else if path.ends_with("/object") {
        Json(json!({ "id": "zxcv", "name": "Bob", "location": "Palo Alto, CA" })).into_response()
    } else if let Some(i) = segments.iter().position(|s| *s == "country") {
        let country = segments.get(i + 1).copied().unwrap_or_default();
        let state = segments.get(i + 3).copied().unwrap_or_default();
        Json(json!({ "country": country, "state": state })).into_response()
    } else if path.ends_with("/info") {
        Json(json!({ "name": info.name, "port": info.port })).into_response()
    } else if let Some(i) = segments.iter().position(|s| *s == "send-back-header") {
        let value = segments.get(i + 1).copied().unwrap_or_default().to_string();
        let received = headers
            .get("x-mox-incoming-test")
            .and_then(|v| v.to_str().ok())
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null);
        (
            [("x-mox-outgoing-test", value)],
            Json(json!({ "received": received })),
        )
            .into_response()
    } else if path.ends_with("/text-plain-looks-like-json") {
        (
            [(header::CONTENT_TYPE, "text/plain")],
            json!({ "message": "looks like json" }).to_string(),
        )
            .into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

fn post_route(path: &str, content_type: &str, bytes: &[u8]) -> Response {
    let incorrect = || (StatusCode::BAD_REQUEST, "Incorrect content type").into_response();
    let text = String::from_utf8_lossy(bytes).to_string();

    if path.ends_with("/send-back-foo") {
        if content_type != "application/json" {
            return incorrect();
        }
        let body: Value = serde_json::from_slice(bytes).unwrap_or(Value::Null);
        Json(json!({ "this-is-foo": body["foo"] })).into_response()
    } else if path.ends_with("/first-5-chars") {
        if content_type != "text/plain" {
            return incorrect();
        }
        let head: String = text.chars().take(5).collect();
        ([(header::CONTENT_TYPE, "text/plain")], head).into_response()
    } else if path.ends_with("/send-back-json-body") {
        if content_type != "application/json" {
            return incorrect();
        }
        let body: Value = serde_json::from_slice(bytes).unwrap_or(Value::Null);
        Json(json!({ "message": "ok", "received": body })).into_response()
    } else if path.ends_with("/send-back-text-body") {
        if content_type != "text/plain" {
            return incorrect();
        }
        ([(header::CONTENT_TYPE, "text/plain")], format!("received: {}", text)).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// A running mox server.
pub struct TestMox {
    pub addr: SocketAddr,
    pub router: MoxRouter,
    shutdown: Shutdown,
}

impl TestMox {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestMox {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at `target`, with unmatched routes not proxied.
pub fn config_for(target: SocketAddr) -> MoxConfig {
    let mut config = MoxConfig::default();
    config.target_url = format!("http://{}", target);
    config.proxy_unmatched_routes = false;
    config
}

/// Start mox with `config` on an ephemeral port.
pub async fn start_mox(config: MoxConfig) -> TestMox {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = MoxServer::new(config).unwrap();
    let router = server.router().clone();
    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(server.run(listener, receiver));
    TestMox {
        addr,
        router,
        shutdown,
    }
}
