//! Per-request execution state.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::http::request::MoxRequest;
use crate::http::response::ResponseHead;
use crate::pipeline::handler::PipelineEnv;
use crate::pipeline::transformer::Transformer;

/// State of one execution of a chain.
///
/// Created for every incoming request and dropped once the response is
/// written; never shared between requests.
pub struct ExecutionContext {
    /// The live request; request-phase transformers rewrite it in place.
    pub request: MoxRequest,
    /// Status and headers of the response being built for the client.
    pub response: ResponseHead,
    /// Upstream base address for the eventual call.
    pub target_url: String,
    /// Correlation ID for logs.
    pub request_id: String,
    queue: VecDeque<Transformer>,
    env: Arc<PipelineEnv>,
}

impl ExecutionContext {
    pub(crate) fn new(
        chain: &[Transformer],
        env: Arc<PipelineEnv>,
        request: MoxRequest,
        request_id: String,
    ) -> Self {
        Self {
            request,
            response: ResponseHead::default(),
            target_url: env.target_url.clone(),
            request_id,
            queue: chain.iter().cloned().collect(),
            env,
        }
    }

    /// Number of transformers still to run.
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn pop(&mut self) -> Option<Transformer> {
        self.queue.pop_front()
    }

    /// Insert transformers at the head of the remaining work, keeping their order.
    pub fn splice_front(&mut self, transformers: Vec<Transformer>) {
        for transformer in transformers.into_iter().rev() {
            self.queue.push_front(transformer);
        }
    }

    pub(crate) fn env(&self) -> &Arc<PipelineEnv> {
        &self.env
    }
}
