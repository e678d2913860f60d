//! End-to-end tests: client → mox → scripted backend.

mod common;

use std::sync::{Arc, Mutex};

use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};

use common::{closed_port, config_for, start_backend, start_mox};
use mox::pipeline::ApplyArgs;
use mox::Body;

async fn get_json(url: String) -> Value {
    reqwest::get(url).await.unwrap().json().await.unwrap()
}

async fn post_json(url: String, body: Value) -> reqwest::Response {
    reqwest::Client::new().post(url).json(&body).send().await.unwrap()
}

async fn post_text(url: String, body: &str) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .header(CONTENT_TYPE, "text/plain")
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}

// --- transformers ---

#[tokio::test]
async fn test_goto() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.get("/this/leads/nowhere").goto("/api/array");

    let body = get_json(mox.url("/this/leads/nowhere")).await;
    assert_eq!(body, json!(["foo", "bar", "baz"]));
}

#[tokio::test]
async fn test_goto_with_route_params() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router
        .get("/lookup/:country")
        .goto_with(|_, req| format!("/v1/country/{}/state/CA/info", req.params["country"]));

    let body = get_json(mox.url("/lookup/US")).await;
    assert_eq!(body, json!({ "country": "US", "state": "CA" }));
}

#[tokio::test]
async fn test_set_base_full_passthrough() {
    let backend = start_backend("default_server").await;
    let second = start_backend("Second Server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.get("/1/info").set_base(format!("http://{}", second));

    let body = get_json(mox.url("/1/info")).await;
    assert_eq!(body, json!({ "name": "Second Server", "port": second.port() }));
}

#[tokio::test]
async fn test_set_base_with_mutation() {
    let backend = start_backend("default_server").await;
    let second = start_backend("Second Server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router
        .get("/1/info")
        .set_base(format!("http://{}", second))
        .mutate(|body, _| match body {
            Body::Json(mut value) => {
                value["test"] = json!(100);
                Body::Json(value)
            }
            other => other,
        });

    let body = get_json(mox.url("/1/info")).await;
    assert_eq!(
        body,
        json!({ "name": "Second Server", "port": second.port(), "test": 100 })
    );
}

#[tokio::test]
async fn test_mutate() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.get("/1/object").mutate(|body, ctx| match body {
        Body::Json(mut value) => {
            value["extra"] = json!("this is extra");
            value["hasReq"] = json!(ctx.request.url == "/1/object");
            value["hasResp"] = json!(ctx.response.status.is_success());
            Body::Json(value)
        }
        other => other,
    });

    let body = get_json(mox.url("/1/object")).await;
    assert_eq!(
        body,
        json!({
            "id": "zxcv",
            "name": "Bob",
            "location": "Palo Alto, CA",
            "extra": "this is extra",
            "hasReq": true,
            "hasResp": true,
        })
    );
}

#[tokio::test]
async fn test_transformers_chain() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router
        .get("/1/chains")
        .mock(json!({ "num": 100 }))
        .mutate(|body, _| match body {
            Body::Json(value) => Body::Json(json!({ "num": value["num"].as_i64().unwrap() + 1 })),
            other => other,
        });

    let body = get_json(mox.url("/1/chains")).await;
    assert_eq!(body, json!({ "num": 101 }));
}

#[tokio::test]
async fn test_apply() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router
        .get("/1/dead/end")
        .goto("/1/array")
        .apply(|ApplyArgs { mox, .. }| {
            mox.mutate(|body, _| match body {
                Body::Json(Value::Array(mut items)) => {
                    items.push(json!(5));
                    Body::Json(Value::Array(items))
                }
                other => other,
            });
        });

    let body = get_json(mox.url("/1/dead/end")).await;
    assert_eq!(body, json!(["foo", "bar", "baz", 5]));
}

#[tokio::test]
async fn test_modify_req() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.get("/1/send-back-header/*").req(|req| {
        req.headers.insert(
            "x-mox-incoming-test",
            reqwest::header::HeaderValue::from_static("gotcha!"),
        );
    });

    let body = get_json(mox.url("/1/send-back-header/foo")).await;
    assert_eq!(body, json!({ "received": "gotcha!" }));
}

#[tokio::test]
async fn test_modify_res() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.get("/1/send-back-header/*").res(|res| {
        res.set_header(
            reqwest::header::HeaderName::from_static("x-mox-outgoing-test"),
            reqwest::header::HeaderValue::from_static("nailed it"),
        );
    });

    let response = reqwest::get(mox.url("/1/send-back-header/foo")).await.unwrap();
    assert_eq!(response.headers()["x-mox-outgoing-test"], "nailed it");
}

#[tokio::test]
async fn test_upstream_headers_are_propagated() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.get("/1/send-back-header/*").send();

    let response = reqwest::get(mox.url("/1/send-back-header/from-upstream")).await.unwrap();
    assert_eq!(response.headers()["x-mox-outgoing-test"], "from-upstream");
    assert!(response.headers().contains_key("x-request-id"));
}

// --- content-type / body handling ---

fn capturing_route(mox: &common::TestMox, path: &str) -> Arc<Mutex<Vec<Body>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    mox.router.post(path).apply(move |ApplyArgs { mox, req, .. }| {
        sink.lock().unwrap().push(req.body.clone());
        mox.mock(Value::Null);
    });
    seen
}

#[tokio::test]
async fn test_parses_request_bodies() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    let seen = capturing_route(&mox, "/1/dead-end");
    let url = mox.url("/1/dead-end");

    post_json(url.clone(), json!({ "foo": "bar" })).await;
    post_text(url.clone(), r#"{"foo":"bar"}"#).await;
    post_json(url.clone(), json!([1, 2, 3])).await;
    post_json(url.clone(), json!([])).await;
    let last = post_json(url, json!({})).await;
    assert_eq!(last.status(), 200);

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            Body::Json(json!({ "foo": "bar" })),
            Body::Text(r#"{"foo":"bar"}"#.to_string()),
            Body::Json(json!([1, 2, 3])),
            Body::Json(json!([])),
            Body::Json(json!({})),
        ]
    );
}

#[tokio::test]
async fn test_reserializes_json_for_upstream() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.post("/1/send-back-json-body").mutate(|body, _| body);
    mox.router.post("/1/send-back-foo").mutate(|body, _| body);

    let echoed: Value = post_json(mox.url("/1/send-back-json-body"), json!({ "foo": "bar" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(echoed, json!({ "message": "ok", "received": { "foo": "bar" } }));

    let parsed: Value = post_json(mox.url("/1/send-back-foo"), json!({ "foo": "bar" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(parsed, json!({ "this-is-foo": "bar" }));
}

#[tokio::test]
async fn test_reserializes_text_for_upstream() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.post("/1/send-back-text-body").mutate(|body, _| body);
    mox.router.post("/1/first-5-chars").mutate(|body, _| body);

    let echoed = post_text(mox.url("/1/send-back-text-body"), r#"{"foo":"bar"}"#)
        .await
        .text()
        .await
        .unwrap();
    assert_eq!(echoed, r#"received: {"foo":"bar"}"#);

    let head = post_text(mox.url("/1/first-5-chars"), r#"{"foo":"bar"}"#)
        .await
        .text()
        .await
        .unwrap();
    assert_eq!(head, r#"{"foo"#);
}

#[tokio::test]
async fn test_text_plain_is_not_parsed_as_json() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    mox.router.get("/1/text-plain-looks-like-json").mutate(move |body, _| {
        *sink.lock().unwrap() = Some(body.clone());
        body
    });

    reqwest::get(mox.url("/1/text-plain-looks-like-json")).await.unwrap();
    assert!(matches!(*seen.lock().unwrap(), Some(Body::Text(_))));
}

// --- pass-through proxy behavior ---

#[tokio::test]
async fn test_restreams_json_body() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.post("/1/send-back-json-body");

    let body: Value = post_json(mox.url("/1/send-back-json-body"), json!({ "foo": "bar" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "message": "ok", "received": { "foo": "bar" } }));
}

#[tokio::test]
async fn test_restreams_text_body() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.post("/1/send-back-text-body");

    let body = post_text(mox.url("/1/send-back-text-body"), r#"{"foo":"bar"}"#)
        .await
        .text()
        .await
        .unwrap();
    assert_eq!(body, r#"received: {"foo":"bar"}"#);
}

#[tokio::test]
async fn test_changes_and_restreams_body() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router
        .post("/1/send-back-json-body")
        .apply(|ApplyArgs { req, .. }| {
            if let Body::Json(Value::Object(map)) = &mut req.body {
                map.insert("extra".to_string(), json!("property"));
            }
        });

    let body: Value = post_json(mox.url("/1/send-back-json-body"), json!({ "foo": "bar" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(
        body,
        json!({ "message": "ok", "received": { "foo": "bar", "extra": "property" } })
    );
}

#[tokio::test]
async fn test_restreams_arrays() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    mox.router.post("/1/send-back-json-body");
    mox.router
        .post("/2/send-back-json-body")
        .apply(|ApplyArgs { req, .. }| {
            if let Body::Json(Value::Array(items)) = &mut req.body {
                items.push(json!("imposter"));
            }
        });

    let empty: Value = post_json(mox.url("/1/send-back-json-body"), json!([]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(empty, json!({ "message": "ok", "received": [] }));

    let changed: Value = post_json(mox.url("/2/send-back-json-body"), json!([1, 2, 3]))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(changed, json!({ "message": "ok", "received": [1, 2, 3, "imposter"] }));
}

// --- server behavior ---

#[tokio::test]
async fn test_unmatched_route_is_404_when_not_proxied() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;

    let response = reqwest::get(mox.url("/api/array")).await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_unmatched_route_is_proxied() {
    let backend = start_backend("default_server").await;
    let mut config = config_for(backend);
    config.proxy_unmatched_routes = true;
    let mox = start_mox(config).await;

    let body = get_json(mox.url("/api/object")).await;
    assert_eq!(body["id"], "zxcv");

    let echoed: Value = post_json(mox.url("/api/send-back-json-body"), json!({ "raw": true }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(echoed["received"], json!({ "raw": true }));
}

#[tokio::test]
async fn test_routes_registered_while_serving() {
    let backend = start_backend("default_server").await;
    let mox = start_mox(config_for(backend)).await;
    assert_eq!(reqwest::get(mox.url("/late")).await.unwrap().status(), 404);

    mox.router.get("/late").mock("here now");
    let response = reqwest::get(mox.url("/late")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "here now");
}

#[tokio::test]
async fn test_upstream_down_answers_502() {
    let down = closed_port().await;
    let mox = start_mox(config_for(down)).await;
    mox.router.get("/1/object").send();
    mox.router.get("/2/object");

    let dispatched = reqwest::get(mox.url("/1/object")).await.unwrap();
    assert_eq!(dispatched.status(), 502);

    let passed = reqwest::get(mox.url("/2/object")).await.unwrap();
    assert_eq!(passed.status(), 502);
}

#[tokio::test]
async fn test_etag_when_enabled() {
    let backend = start_backend("default_server").await;
    let mut config = config_for(backend);
    config.disable_etag = false;
    let mox = start_mox(config).await;
    mox.router.get("/1/object").send();

    let first = reqwest::get(mox.url("/1/object")).await.unwrap();
    let etag = first.headers()["etag"].clone();

    let second = reqwest::Client::new()
        .get(mox.url("/1/object"))
        .header("if-none-match", etag)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 304);
}

#[tokio::test]
async fn test_declared_routes() {
    let backend = start_backend("default_server").await;
    let mut config = mox::config::parse_config(
        r#"
[[routes]]
method = "GET"
path = "/declared/:id"

[[routes.steps]]
action = "goto"
path = "/api/object"

[[routes.steps]]
action = "header"
name = "x-declared"
value = "yes"
"#,
    )
    .unwrap();
    config.target_url = format!("http://{}", backend);
    let mox = start_mox(config).await;

    let response = reqwest::get(mox.url("/declared/7")).await.unwrap();
    assert_eq!(response.headers()["x-declared"], "yes");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Bob");
}
