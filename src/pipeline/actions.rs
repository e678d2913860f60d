//! The pipeline builder.
//!
//! Every operation appends one transformer and returns the builder so
//! calls chain:
//!
//! ```ignore
//! router.get("/1/chains").mock(json!({ "num": 100 })).mutate(|body, _| body);
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;

use crate::http::body::Body;
use crate::http::request::MoxRequest;
use crate::http::response::ResponseHead;
use crate::observability::metrics;
use crate::pipeline::context::ExecutionContext;
use crate::pipeline::error::{BoxError, PipelineError, PipelineResult};
use crate::pipeline::handler::{Handler, PipelineEnv};
use crate::pipeline::transformer::{request_fn, response_fn, Transformer};

/// Options for [`Actions::log`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions {
    /// Leave headers out of the log record.
    pub hide_headers: bool,
}

/// Live handles passed to an `apply` callback.
///
/// `mox` is a fresh builder scoped to this one invocation; whatever it
/// accumulates runs next.
pub struct ApplyArgs<'a> {
    pub mox: &'a Actions,
    pub req: &'a mut MoxRequest,
    pub res: &'a mut ResponseHead,
}

/// Accumulates a chain of transformers.
#[derive(Clone)]
pub struct Actions {
    transformers: Arc<Mutex<Vec<Transformer>>>,
    env: Arc<PipelineEnv>,
}

impl Actions {
    /// Start an empty chain.
    pub fn new(env: Arc<PipelineEnv>) -> Self {
        Self {
            transformers: Arc::new(Mutex::new(Vec::new())),
            env,
        }
    }

    /// Number of transformers appended so far.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Transformer>> {
        self.transformers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, transformer: Transformer) -> &Self {
        self.lock().push(transformer);
        self
    }

    /// Drain the accumulated transformers.
    pub(crate) fn take_transformers(&self) -> Vec<Transformer> {
        std::mem::take(&mut *self.lock())
    }

    /// Suspend for `ms` milliseconds, in whichever phase this is met.
    pub fn delay(&self, ms: u64) -> &Self {
        let duration = Duration::from_millis(ms);
        self.push(Transformer::flex(
            request_fn(move |_| {
                Box::pin(async move {
                    tokio::time::sleep(duration).await;
                    Ok(())
                })
            }),
            response_fn(move |body, _| {
                Box::pin(async move {
                    tokio::time::sleep(duration).await;
                    Ok(body)
                })
            }),
        ))
    }

    /// Record the request (before the upstream call) or the response (after it).
    pub fn log(&self, options: LogOptions) -> &Self {
        self.push(Transformer::flex(
            request_fn(move |ctx| {
                let request = &ctx.request;
                if options.hide_headers {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        method = %request.method,
                        url = %request.url,
                        params = ?request.params,
                        query = ?request.query(),
                        body = %request.body,
                        "Request"
                    );
                } else {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        method = %request.method,
                        url = %request.url,
                        params = ?request.params,
                        query = ?request.query(),
                        headers = ?request.headers,
                        body = %request.body,
                        "Request"
                    );
                }
                Box::pin(async { Ok(()) })
            }),
            response_fn(move |body, ctx| {
                if options.hide_headers {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        status = ctx.response.status.as_u16(),
                        body = %body,
                        "Response"
                    );
                } else {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        status = ctx.response.status.as_u16(),
                        headers = ?ctx.response.headers,
                        body = %body,
                        "Response"
                    );
                }
                Box::pin(async move { Ok(body) })
            }),
        ))
    }

    /// Extend the running chain from a callback.
    ///
    /// The callback gets a fresh builder; its transformers are spliced in
    /// front of the remaining work of the current execution only.
    pub fn apply<F>(&self, f: F) -> &Self
    where
        F: for<'a> Fn(ApplyArgs<'a>) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let on_request = f.clone();
        self.push(Transformer::flex(
            request_fn(move |ctx| {
                splice_sync(&*on_request, ctx);
                Box::pin(async { Ok(()) })
            }),
            response_fn(move |body, ctx| {
                splice_sync(&*f, ctx);
                Box::pin(async move { Ok(body) })
            }),
        ))
    }

    /// Like [`apply`](Self::apply), for callbacks that await.
    ///
    /// An error from the callback aborts the execution.
    pub fn apply_async<F>(&self, f: F) -> &Self
    where
        F: for<'a> Fn(ApplyArgs<'a>) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let on_request = f.clone();
        self.push(Transformer::flex(
            request_fn(move |ctx| Box::pin(splice_async(on_request.clone(), ctx))),
            response_fn(move |body, ctx| {
                let f = f.clone();
                Box::pin(async move {
                    splice_async(f, ctx).await?;
                    Ok(body)
                })
            }),
        ))
    }

    /// Edit the request before it leaves.
    pub fn req<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut MoxRequest) + Send + Sync + 'static,
    {
        self.push(Transformer::request(request_fn(move |ctx| {
            f(&mut ctx.request);
            Box::pin(async { Ok(()) })
        })))
    }

    /// Edit the response status and headers.
    pub fn res<F>(&self, f: F) -> &Self
    where
        F: Fn(&mut ResponseHead) + Send + Sync + 'static,
    {
        self.push(Transformer::response(response_fn(move |body, ctx| {
            f(&mut ctx.response);
            Box::pin(async move { Ok(body) })
        })))
    }

    /// Set the response status. An invalid code fails the execution.
    pub fn status(&self, code: u16) -> &Self {
        self.push(Transformer::response(response_fn(move |body, ctx| {
            let result = set_status(&mut ctx.response, code).map(|()| body);
            Box::pin(async move { result })
        })))
    }

    /// Replace the body with `f(body, context)`.
    pub fn mutate<F>(&self, f: F) -> &Self
    where
        F: Fn(Body, &ExecutionContext) -> Body + Send + Sync + 'static,
    {
        self.push(Transformer::response(response_fn(move |body, ctx| {
            let body = f(body, ctx);
            Box::pin(async move { Ok(body) })
        })))
    }

    /// Answer with `value` without contacting the upstream.
    pub fn mock(&self, value: impl Into<Body>) -> &Self {
        let value = value.into();
        self.push(
            Transformer::response(response_fn(move |_, _| {
                let value = value.clone();
                Box::pin(async move { Ok(value) })
            }))
            .without_request(),
        )
    }

    /// Answer with `value` and `code` without contacting the upstream.
    pub fn mock_status(&self, value: impl Into<Body>, code: u16) -> &Self {
        let value = value.into();
        self.push(
            Transformer::response(response_fn(move |_, ctx| {
                let result = set_status(&mut ctx.response, code).map(|()| value.clone());
                Box::pin(async move { result })
            }))
            .without_request(),
        )
    }

    /// Rewrite the request path (and query) to `path`.
    pub fn goto(&self, path: impl Into<String>) -> &Self {
        let path = path.into();
        self.push(Transformer::request(request_fn(move |ctx| {
            tracing::debug!(from = %ctx.request.url, to = %path, "Goto");
            ctx.request.url = path.clone();
            Box::pin(async { Ok(()) })
        })))
    }

    /// Rewrite the request path with `f(current_path, request)`.
    pub fn goto_with<F>(&self, f: F) -> &Self
    where
        F: Fn(&str, &MoxRequest) -> String + Send + Sync + 'static,
    {
        self.push(Transformer::request(request_fn(move |ctx| {
            let url = f(&ctx.request.url, &ctx.request);
            tracing::debug!(from = %ctx.request.url, to = %url, "Goto");
            ctx.request.url = url;
            Box::pin(async { Ok(()) })
        })))
    }

    /// Send the eventual upstream call to another base URL.
    pub fn set_base(&self, url: impl Into<String>) -> &Self {
        let url = url.into();
        self.push(Transformer::request(request_fn(move |ctx| {
            ctx.target_url = url.clone();
            Box::pin(async { Ok(()) })
        })))
    }

    /// Force the upstream call here, leaving the body untouched.
    pub fn send(&self) -> &Self {
        self.push(Transformer::response(response_fn(|body, _| {
            Box::pin(async move { Ok(body) })
        })))
    }

    /// Freeze the chain into a handler.
    ///
    /// The implicit trailing passthrough is appended to the snapshot, not
    /// to this builder; later appends do not affect the returned handler.
    pub fn compile(&self) -> Handler {
        let mut chain = self.lock().clone();
        chain.push(Transformer::pass_through());
        metrics::record_compilation();
        tracing::debug!(transformers = chain.len(), "Compiled chain");
        Handler::new(chain, self.env.clone())
    }
}

fn set_status(head: &mut ResponseHead, code: u16) -> PipelineResult<()> {
    let status = StatusCode::from_u16(code)
        .map_err(|_| PipelineError::Transformer(format!("invalid status code {}", code)))?;
    head.set_status(status);
    Ok(())
}

fn splice_sync<F>(f: &F, ctx: &mut ExecutionContext)
where
    F: for<'a> Fn(ApplyArgs<'a>),
{
    let sub = Actions::new(ctx.env().clone());
    f(ApplyArgs {
        mox: &sub,
        req: &mut ctx.request,
        res: &mut ctx.response,
    });
    ctx.splice_front(sub.take_transformers());
}

async fn splice_async<F>(f: Arc<F>, ctx: &mut ExecutionContext) -> PipelineResult<()>
where
    F: for<'a> Fn(ApplyArgs<'a>) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync + 'static,
{
    let sub = Actions::new(ctx.env().clone());
    f(ApplyArgs {
        mox: &sub,
        req: &mut ctx.request,
        res: &mut ctx.response,
    })
    .await
    .map_err(|e| PipelineError::Transformer(e.to_string()))?;
    ctx.splice_front(sub.take_transformers());
    Ok(())
}
