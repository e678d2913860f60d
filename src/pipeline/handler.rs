//! Compiled handlers and the environment they run in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body as AxumBody;
use axum::http::{header, HeaderValue, Response};
use axum::response::IntoResponse;
use tracing::Instrument;

use crate::http::request::MoxRequest;
use crate::observability::metrics;
use crate::pipeline::engine::{self, Outcome};
use crate::pipeline::error::PipelineError;
use crate::pipeline::transformer::Transformer;
use crate::upstream::{PassThrough, Upstream};

/// Collaborators and settings shared by every chain of a server.
pub struct PipelineEnv {
    /// Base URL every execution starts with.
    pub target_url: String,
    pub upstream: Arc<dyn Upstream>,
    pub passthrough: Arc<dyn PassThrough>,
    /// Deadline for one whole execution.
    pub execution_timeout: Duration,
    /// Generate weak ETags for pipeline-written responses.
    pub etag: bool,
}

/// An immutable chain bound to its environment.
///
/// Cheap to clone; every invocation runs against a fresh context.
#[derive(Clone)]
pub struct Handler {
    chain: Arc<[Transformer]>,
    env: Arc<PipelineEnv>,
}

impl Handler {
    pub(crate) fn new(chain: Vec<Transformer>, env: Arc<PipelineEnv>) -> Self {
        Self {
            chain: chain.into(),
            env,
        }
    }

    /// Number of transformers, including the implicit trailing passthrough.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Run the chain against one request and produce the client response.
    ///
    /// Failures are logged and answered with a 5xx carrying a diagnostic,
    /// so the client is never left without a response.
    pub async fn handle(&self, request: MoxRequest) -> Response<AxumBody> {
        let start = Instant::now();
        let request_id = request.request_id();
        let span = tracing::info_span!(
            "mox",
            request_id = %request_id,
            method = %request.method,
            url = %request.original_url,
        );

        let deadline = self.env.execution_timeout;
        let execution = engine::execute(&self.chain, &self.env, request, request_id);
        let result = match tokio::time::timeout(deadline, execution).instrument(span.clone()).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout(deadline)),
        };

        let _entered = span.enter();
        match result {
            Ok(Outcome::Responded(response)) => {
                metrics::record_execution("responded", start);
                response
            }
            Ok(Outcome::PassedThrough(response)) => {
                metrics::record_execution("passthrough", start);
                response
            }
            Err(e) => {
                let outcome = match e {
                    PipelineError::Timeout(_) => "timeout",
                    _ => "failed",
                };
                metrics::record_execution(outcome, start);
                tracing::error!(error = %e, "An unexpected error occurred");
                failure_response(&e)
            }
        }
    }
}

fn failure_response(error: &PipelineError) -> Response<AxumBody> {
    (
        error.status(),
        [(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))],
        format!("mox: {}", error),
    )
        .into_response()
}
