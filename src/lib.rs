//! mox: a programmable HTTP proxy.
//!
//! Routes are bound to chains of transformers. A chain edits the inbound
//! request, triggers at most one upstream call (or mocks it), then edits
//! the response body before it reaches the client:
//!
//! ```ignore
//! let server = MoxServer::new(MoxConfig::default())?;
//! let router = server.router();
//! router.get("/1/chains").mock(json!({ "num": 100 }));
//! router.get("/*/array").goto("/api/array").mutate(|body, _| body);
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod routing;
pub mod upstream;

pub use config::schema::MoxConfig;
pub use http::{Body, MoxRequest, MoxServer, ResponseHead};
pub use lifecycle::Shutdown;
pub use pipeline::{Actions, ApplyArgs, ExecutionContext, Handler, LogOptions};
pub use routing::MoxRouter;
