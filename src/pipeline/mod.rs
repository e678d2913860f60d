//! Transform pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration:
//!     → actions.rs (builder appends transformers)
//!     → compile (snapshot + trailing passthrough → Handler)
//!
//! Per request:
//!     → handler.rs (deadline, request span, failure policy)
//!     → engine.rs (REQUEST phase → trigger → RESPONSE phase)
//!         → context.rs (live request, response head, work queue)
//!         → upstream dispatcher or passthrough at the trigger
//!     → body written to the client
//! ```
//!
//! # Design Decisions
//! - Transformers are plain records with optional async closures
//! - The chain is a work-list so `apply` can splice at the cursor
//! - Compiled chains are immutable and shared across requests

pub mod actions;
pub mod context;
pub mod engine;
pub mod error;
pub mod handler;
pub mod transformer;

pub use actions::{Actions, ApplyArgs, LogOptions};
pub use context::ExecutionContext;
pub use engine::Outcome;
pub use error::{BoxError, PipelineError, PipelineResult};
pub use handler::{Handler, PipelineEnv};
pub use transformer::{request_fn, response_fn, RequestFn, ResponseFn, Transformer};
