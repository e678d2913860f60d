//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared pipeline environment (client, dispatcher, passthrough)
//! - Register declared routes and expose the router for programmatic ones
//! - Wire up middleware (tracing, request ID)
//! - Dispatch requests: matched route → compiled chain, otherwise
//!   passthrough or 404

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, Response, StatusCode},
    response::IntoResponse,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::MoxConfig;
use crate::http::request::MoxRequest;
use crate::pipeline::PipelineEnv;
use crate::routing::{register_routes, MoxRouter, RouteConfigError};
use crate::upstream::{build_client, HttpPassThrough, HttpUpstream};

/// Application state injected into the dispatcher.
#[derive(Clone)]
struct AppState {
    router: MoxRouter,
    passthrough: Arc<HttpPassThrough>,
    target_url: String,
    proxy_unmatched_routes: bool,
    max_body_size: usize,
}

/// The mox server: a router of transform chains in front of one upstream.
pub struct MoxServer {
    app: Router,
    router: MoxRouter,
    config: MoxConfig,
}

impl MoxServer {
    /// Create a server from its configuration.
    ///
    /// Declared routes are registered here; more can be added through
    /// [`router`](Self::router) at any time, including while serving.
    pub fn new(config: MoxConfig) -> Result<Self, RouteConfigError> {
        let client = build_client();
        let upstream_timeout = Duration::from_secs(config.timeouts.upstream_secs);
        let upstream = Arc::new(HttpUpstream::new(
            client.clone(),
            upstream_timeout,
            config.limits.max_body_size,
        ));
        let passthrough = Arc::new(HttpPassThrough::new(client, upstream_timeout));

        let env = Arc::new(PipelineEnv {
            target_url: config.target_url.clone(),
            upstream,
            passthrough: passthrough.clone(),
            execution_timeout: Duration::from_secs(config.timeouts.execution_secs),
            etag: !config.disable_etag,
        });

        let router = MoxRouter::new(env);
        register_routes(&router, &config.routes)?;

        let state = AppState {
            router: router.clone(),
            passthrough,
            target_url: config.target_url.clone(),
            proxy_unmatched_routes: config.proxy_unmatched_routes,
            max_body_size: config.limits.max_body_size,
        };

        Ok(Self {
            app: Self::build_router(state),
            router,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Route registration handle.
    pub fn router(&self) -> &MoxRouter {
        &self.router
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &MoxConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            target = %self.config.target_url,
            routes = self.router.len(),
            "Mox server starting"
        );

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("Mox server stopped");
        Ok(())
    }
}

/// Resolve a request to its route, or fall back to passthrough / 404.
async fn dispatch(State(state): State<AppState>, request: Request<AxumBody>) -> Response<AxumBody> {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some((route, params)) = state.router.match_request(&method, &path) else {
        if state.proxy_unmatched_routes {
            return state.passthrough.forward_raw(request, &state.target_url).await;
        }
        tracing::debug!(method = %method, path = %path, "No route matched");
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, state.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(method = %method, path = %path, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body unreadable or too large")
                .into_response();
        }
    };

    let mut request = MoxRequest::from_parts(parts, bytes);
    request.params = params;
    route.handler().handle(request).await
}
