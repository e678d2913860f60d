//! The transformer: atomic unit of a chain.
//!
//! A transformer is a tagged record rather than a trait object hierarchy.
//! Both capabilities are optional and default to identity, so any
//! transformer may appear in either phase.

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::body::Body;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::PipelineResult;

/// Request-phase capability: rewrites the live request held by the context.
pub type RequestFn =
    Arc<dyn for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, PipelineResult<()>> + Send + Sync>;

/// Response-phase capability: maps the working body.
pub type ResponseFn = Arc<
    dyn for<'a> Fn(Body, &'a mut ExecutionContext) -> BoxFuture<'a, PipelineResult<Body>>
        + Send
        + Sync,
>;

/// Wrap a closure as a [`RequestFn`].
pub fn request_fn<F>(f: F) -> RequestFn
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, PipelineResult<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`ResponseFn`].
pub fn response_fn<F>(f: F) -> ResponseFn
where
    F: for<'a> Fn(Body, &'a mut ExecutionContext) -> BoxFuture<'a, PipelineResult<Body>>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// One step of a chain.
#[derive(Clone, Default)]
pub struct Transformer {
    /// Meeting this in the request phase moves the engine to the response phase.
    pub trigger_send: bool,
    /// The transition skips the upstream and starts from an empty object.
    pub dont_request: bool,
    /// The transition hands the whole exchange to the passthrough proxy.
    pub full_pass_through: bool,
    on_request: Option<RequestFn>,
    on_response: Option<ResponseFn>,
}

impl Transformer {
    /// A non-triggering transformer acting in whichever phase it is met.
    pub fn flex(on_request: RequestFn, on_response: ResponseFn) -> Self {
        Self {
            on_request: Some(on_request),
            on_response: Some(on_response),
            ..Default::default()
        }
    }

    /// A request-only transformer.
    pub fn request(on_request: RequestFn) -> Self {
        Self {
            on_request: Some(on_request),
            ..Default::default()
        }
    }

    /// A response-only transformer; it always triggers the transition.
    pub fn response(on_response: ResponseFn) -> Self {
        Self {
            trigger_send: true,
            on_response: Some(on_response),
            ..Default::default()
        }
    }

    /// The trailing transformer every compiled chain ends with.
    pub fn pass_through() -> Self {
        Self {
            trigger_send: true,
            full_pass_through: true,
            ..Default::default()
        }
    }

    /// Skip the upstream when this transformer triggers the transition.
    pub fn without_request(mut self) -> Self {
        self.dont_request = true;
        self
    }

    /// Apply the request-phase capability.
    pub async fn modify_request(&self, ctx: &mut ExecutionContext) -> PipelineResult<()> {
        match &self.on_request {
            Some(f) => f(ctx).await,
            None => Ok(()),
        }
    }

    /// Apply the response-phase capability.
    pub async fn modify_response(&self, body: Body, ctx: &mut ExecutionContext) -> PipelineResult<Body> {
        match &self.on_response {
            Some(f) => f(body, ctx).await,
            None => Ok(body),
        }
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transformer")
            .field("trigger_send", &self.trigger_send)
            .field("dont_request", &self.dont_request)
            .field("full_pass_through", &self.full_pass_through)
            .field("on_request", &self.on_request.is_some())
            .field("on_response", &self.on_response.is_some())
            .finish()
    }
}
