//! Routes declared in the config file.
//!
//! Each `[[routes]]` entry becomes one registration; each step maps to a
//! single builder operation, in order.

use axum::http::{HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;

use crate::config::{RouteConfig, StepConfig};
use crate::http::body::Body;
use crate::pipeline::{Actions, LogOptions};
use crate::routing::matcher::MethodMatcher;
use crate::routing::router::MoxRouter;

/// A declared route that cannot be registered.
#[derive(Debug, Error)]
pub enum RouteConfigError {
    #[error("route {path}: unknown method '{method}'")]
    Method { method: String, path: String },

    #[error("route {path}: invalid header '{name}'")]
    Header { name: String, path: String },
}

/// Register every declared route on `router`, in file order.
pub fn register_routes(router: &MoxRouter, routes: &[RouteConfig]) -> Result<(), RouteConfigError> {
    for route in routes {
        let method = MethodMatcher::parse(&route.method).ok_or_else(|| RouteConfigError::Method {
            method: route.method.clone(),
            path: route.path.clone(),
        })?;
        let actions = router.route(method, &route.path);
        for step in &route.steps {
            apply_step(&actions, step, &route.path)?;
        }
        tracing::info!(
            method = %route.method,
            path = %route.path,
            steps = route.steps.len(),
            "Declared route registered"
        );
    }
    Ok(())
}

fn apply_step(actions: &Actions, step: &StepConfig, path: &str) -> Result<(), RouteConfigError> {
    match step {
        StepConfig::Delay { ms } => {
            actions.delay(*ms);
        }
        StepConfig::Log { hide_headers } => {
            actions.log(LogOptions {
                hide_headers: *hide_headers,
            });
        }
        StepConfig::Goto { path } => {
            actions.goto(path.clone());
        }
        StepConfig::SetBase { url } => {
            actions.set_base(url.clone());
        }
        StepConfig::Status { code } => {
            actions.status(*code);
        }
        StepConfig::Header { name, value } => {
            let invalid = || RouteConfigError::Header {
                name: name.clone(),
                path: path.to_string(),
            };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            actions.res(move |res| res.set_header(name.clone(), value.clone()));
        }
        StepConfig::Mock { body, status } => {
            let body = match body {
                Value::Null => Body::Empty,
                other => Body::Json(other.clone()),
            };
            match status {
                Some(code) => actions.mock_status(body, *code),
                None => actions.mock(body),
            };
        }
        StepConfig::Send => {
            actions.send();
        }
    }
    Ok(())
}
