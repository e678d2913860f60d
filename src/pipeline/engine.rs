//! Execution engine.
//!
//! # Algorithm
//! ```text
//! decode inbound body
//! while queue not empty:
//!     t = pop front
//!     if REQUEST and t.trigger_send:           (first trigger only)
//!         full_pass_through → hand off, stop   (PASSTHROUGH)
//!         dont_request      → body = {}
//!         otherwise         → body = upstream, copy status/headers
//!         phase = RESPONSE
//!     RESPONSE → body = t.modify_response(body)
//!     REQUEST  → t.modify_request(request)
//! write body to the client
//! ```
//!
//! The upstream is contacted at most once per execution. Any error aborts
//! the walk and nothing is written to the client from here.

use std::sync::Arc;

use axum::body::Body as AxumBody;
use axum::http::Response;

use crate::http::body::{self, Body};
use crate::http::request::MoxRequest;
use crate::http::response::send_to_client;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::PipelineResult;
use crate::pipeline::handler::PipelineEnv;
use crate::pipeline::transformer::Transformer;

/// Phase of an execution. The passthrough state is terminal and is
/// represented by returning [`Outcome::PassedThrough`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Request,
    Response,
}

/// How an execution ended.
pub enum Outcome {
    /// The engine wrote the final working body.
    Responded(Response<AxumBody>),
    /// The passthrough proxy owned the exchange.
    PassedThrough(Response<AxumBody>),
}

impl Outcome {
    pub fn into_response(self) -> Response<AxumBody> {
        match self {
            Outcome::Responded(response) | Outcome::PassedThrough(response) => response,
        }
    }
}

/// Walk `chain` against one request.
pub async fn execute(
    chain: &[Transformer],
    env: &Arc<PipelineEnv>,
    request: MoxRequest,
    request_id: String,
) -> PipelineResult<Outcome> {
    let mut ctx = ExecutionContext::new(chain, env.clone(), request, request_id);

    let raw = std::mem::take(&mut ctx.request.body);
    ctx.request.body = body::decode_request(&ctx.request.headers, raw)?;

    let mut phase = Phase::Request;
    let mut working = Body::Empty;

    while let Some(transformer) = ctx.pop() {
        if phase == Phase::Request && transformer.trigger_send {
            phase = Phase::Response;
            if transformer.full_pass_through {
                let response = env.passthrough.forward(ctx.request, &ctx.target_url).await;
                return Ok(Outcome::PassedThrough(response));
            } else if transformer.dont_request {
                tracing::debug!("No request sent");
                working = Body::empty_object();
            } else {
                let upstream = env.upstream.dispatch(&ctx.target_url, &ctx.request).await?;
                ctx.response.propagate(upstream.status, &upstream.headers);
                working = upstream.body;
            }
        }

        match phase {
            Phase::Response => working = transformer.modify_response(working, &mut ctx).await?,
            Phase::Request => transformer.modify_request(&mut ctx).await?,
        }
    }

    let validators = env.etag.then_some(&ctx.request.headers);
    let response = send_to_client(ctx.response, &working, validators)?;
    Ok(Outcome::Responded(response))
}
