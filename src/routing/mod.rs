//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup, first match wins)
//!     → matcher.rs (method filter, path pattern, parameter capture)
//!     → Return: matched Route + params, or no match
//!
//! Registration:
//!     router.get("/users/:id") → Route { matcher, Actions }
//!     declared.rs: [[routes]] from config → same registrations
//!     first matching request → Actions::compile → frozen Handler
//! ```
//!
//! # Design Decisions
//! - Routes may be added while serving; lookups read a snapshot
//! - No regex in the hot path
//! - Deterministic: same input always matches same route

pub mod declared;
pub mod matcher;
pub mod router;

pub use declared::{register_routes, RouteConfigError};
pub use matcher::{Matcher, MethodMatcher, PathPattern};
pub use router::{MoxRouter, Route};
