//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Register routes, each owning a chain builder
//! - Look up the first route matching a request
//! - Compile each route's chain exactly once, on first use
//!
//! # Design Decisions
//! - The route table is an `ArcSwap` snapshot: lookups never lock, and
//!   routes may still be registered after the server started
//! - Registration order is match order (first match wins)
//! - Compilation uses `OnceLock`, so racing first requests compile once

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::pipeline::{Actions, Handler, PipelineEnv};
use crate::routing::matcher::{Matcher, MethodMatcher, PathPattern};

/// A registered route.
pub struct Route {
    method: MethodMatcher,
    pattern: PathPattern,
    actions: Actions,
    handler: OnceLock<Handler>,
}

impl Route {
    pub fn method(&self) -> &MethodMatcher {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    /// The compiled chain, compiling it on first call.
    pub fn handler(&self) -> &Handler {
        self.handler.get_or_init(|| {
            tracing::debug!(method = %self.method, path = %self.pattern.as_str(), "Compiling route");
            self.actions.compile()
        })
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("compiled", &self.handler.get().is_some())
            .finish()
    }
}

impl Matcher for Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        self.method.matches(method, path) && self.pattern.matches(method, path)
    }
}

/// Registers routes and resolves requests to them.
#[derive(Clone)]
pub struct MoxRouter {
    env: Arc<PipelineEnv>,
    routes: Arc<ArcSwap<Vec<Arc<Route>>>>,
}

impl MoxRouter {
    pub fn new(env: Arc<PipelineEnv>) -> Self {
        Self {
            env,
            routes: Arc::new(ArcSwap::from_pointee(Vec::new())),
        }
    }

    /// Register a route and return its chain builder.
    pub fn route(&self, method: MethodMatcher, path: &str) -> Actions {
        let actions = Actions::new(self.env.clone());
        let route = Arc::new(Route {
            method,
            pattern: PathPattern::new(path),
            actions: actions.clone(),
            handler: OnceLock::new(),
        });
        tracing::debug!(method = %route.method, path = %path, "Registered route");
        self.routes.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(route.clone());
            next
        });
        actions
    }

    pub fn all(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Any, path)
    }

    pub fn get(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::GET), path)
    }

    pub fn put(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::PUT), path)
    }

    pub fn post(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::POST), path)
    }

    pub fn delete(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::DELETE), path)
    }

    pub fn patch(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::PATCH), path)
    }

    pub fn head(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::HEAD), path)
    }

    pub fn options(&self, path: &str) -> Actions {
        self.route(MethodMatcher::Exact(Method::OPTIONS), path)
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.load().is_empty()
    }

    /// First route matching the request, with its captured parameters.
    pub fn match_request(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(Arc<Route>, HashMap<String, String>)> {
        let routes = self.routes.load();
        routes
            .iter()
            .filter(|route| route.method.matches(method, path))
            .find_map(|route| {
                route
                    .pattern
                    .captures(path)
                    .map(|params| (route.clone(), params))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::handler::tests::test_env;

    #[test]
    fn test_first_match_wins() {
        let router = MoxRouter::new(test_env());
        router.get("/users/:id").status(201);
        router.all("*").status(202);

        let (route, params) = router.match_request(&Method::GET, "/users/7").unwrap();
        assert_eq!(route.pattern().as_str(), "/users/:id");
        assert_eq!(params["id"], "7");

        let (route, _) = router.match_request(&Method::POST, "/users/7").unwrap();
        assert_eq!(route.pattern().as_str(), "*");
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_no_match() {
        let router = MoxRouter::new(test_env());
        router.post("/only-post");
        assert!(router.match_request(&Method::GET, "/only-post").is_none());
        assert!(router.match_request(&Method::POST, "/other").is_none());
    }

    #[test]
    fn test_route_compiles_once() {
        let router = MoxRouter::new(test_env());
        router.get("/x").send();
        let (route, _) = router.match_request(&Method::GET, "/x").unwrap();

        let handlers: Vec<usize> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| route.handler() as *const Handler as usize))
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });
        assert!(handlers.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(route.handler().len(), 2);
    }

    #[test]
    fn test_appends_after_first_compile_are_ignored() {
        let router = MoxRouter::new(test_env());
        let actions = router.get("/late");
        actions.send();
        let (route, _) = router.match_request(&Method::GET, "/late").unwrap();
        assert_eq!(route.handler().len(), 2);

        actions.status(500);
        assert_eq!(route.handler().len(), 2);
    }
}
