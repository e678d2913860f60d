//! Pipeline error definitions.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::http::body::BodyError;
use crate::upstream::UpstreamError;

/// Error type accepted from user callbacks in `apply_async`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that abort one execution of a chain.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Request body could not be decoded, or the final body encoded.
    #[error("body error: {0}")]
    Body(#[from] BodyError),

    /// The upstream call failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// A transformer raised an error of its own.
    #[error("transformer failed: {0}")]
    Transformer(String),

    /// The execution did not finish within its deadline.
    #[error("execution exceeded {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    /// Status code answered to the client for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::Upstream(UpstreamError::Timeout(_)) | PipelineError::Timeout(_) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            PipelineError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Body(_) | PipelineError::Transformer(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
