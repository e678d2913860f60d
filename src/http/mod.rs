//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, route dispatch)
//!     → request.rs (inbound request → MoxRequest)
//!     → body.rs (content-type driven decode / encode)
//!     → [pipeline runs the route's chain]
//!     → response.rs (response head, final write, ETag)
//!     → headers.rs (hop-by-hop and framing cleanup on every hop)
//!     → Send to client
//! ```

pub mod body;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use body::{Body, BodyError};
pub use request::{MoxRequest, X_REQUEST_ID};
pub use response::ResponseHead;
pub use server::MoxServer;
