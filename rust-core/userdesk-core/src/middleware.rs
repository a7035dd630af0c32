//! # Middleware
//!
//! Request/response interception around handlers: access logging, timing
//! and CORS headers.
//!
//! `before_request` hooks run in registration order and may short-circuit
//! with a response; `after_response` hooks run in reverse order.

use crate::request::HttpRequest;
use crate::response::HttpResponse;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

/// Request/response hook
pub trait Middleware: Send + Sync {
    /// Called before the handler; return `Respond` to skip it
    fn before_request(&self, _req: &HttpRequest) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the handler (or after a short-circuit)
    fn after_response(&self, _req: &HttpRequest, _res: &mut HttpResponse) {}

    /// Name for logs
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Outcome of a `before_request` hook
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to the next middleware / handler
    Continue,
    /// Answer immediately with this response
    Respond(HttpResponse),
}

/// Ordered middleware list
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create an empty chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Run `before_request` hooks in order, stopping at the first `Respond`
    pub fn run_before(&self, req: &HttpRequest) -> MiddlewareResult {
        for mw in &self.middlewares {
            if let MiddlewareResult::Respond(resp) = mw.before_request(req) {
                debug!(middleware = mw.name(), "request short-circuited");
                return MiddlewareResult::Respond(resp);
            }
        }
        MiddlewareResult::Continue
    }

    /// Run `after_response` hooks in reverse order
    pub fn run_after(&self, req: &HttpRequest, res: &mut HttpResponse) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|mw| mw.name()).collect()
    }

    /// Number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// True when no middleware is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Structured request/response events
#[derive(Default)]
pub struct LoggingMiddleware {
    log_headers: bool,
}

impl LoggingMiddleware {
    /// Create a logging middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also log request headers (the `authorization` value is masked)
    #[must_use]
    pub const fn with_headers(mut self) -> Self {
        self.log_headers = true;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn before_request(&self, req: &HttpRequest) -> MiddlewareResult {
        let request_id = req.header("x-request-id").unwrap_or("-");
        if self.log_headers {
            let mut headers = req.headers_map();
            if let Some(auth) = headers.get_mut("authorization") {
                *auth = "***".to_string();
            }
            info!(
                method = %req.method,
                path = %req.path,
                request_id = %request_id,
                headers = ?headers,
                "Request received"
            );
        } else {
            info!(
                method = %req.method,
                path = %req.path,
                request_id = %request_id,
                "Request received"
            );
        }
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &HttpRequest, res: &mut HttpResponse) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Handler duration at debug level, keyed by request id
#[derive(Default)]
pub struct TimingMiddleware {
    started: Mutex<HashMap<String, Instant>>,
}

impl TimingMiddleware {
    /// Create a timing middleware
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests started but not yet answered
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.started.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Middleware for TimingMiddleware {
    fn before_request(&self, req: &HttpRequest) -> MiddlewareResult {
        if let Some(id) = req.header("x-request-id") {
            self.started
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id.to_string(), Instant::now());
        }
        MiddlewareResult::Continue
    }

    fn after_response(&self, req: &HttpRequest, res: &mut HttpResponse) {
        let Some(id) = req.header("x-request-id") else {
            return;
        };
        let started = self
            .started
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if let Some(start) = started {
            debug!(
                method = %req.method,
                path = %req.path,
                status = res.status,
                duration_ms = %start.elapsed().as_millis(),
                "Request timing"
            );
        }
    }

    fn name(&self) -> &'static str {
        "TimingMiddleware"
    }
}

/// Adds Cross-Origin Resource Sharing headers to every response
#[derive(Clone)]
pub struct CorsMiddleware {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl CorsMiddleware {
    /// CORS with permissive defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the allowed origin
    #[must_use]
    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    /// Configured origin
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.allow_origin
    }
}

impl Middleware for CorsMiddleware {
    fn after_response(&self, _req: &HttpRequest, res: &mut HttpResponse) {
        res.set_header("Access-Control-Allow-Origin", &self.allow_origin);
        res.set_header("Access-Control-Allow-Methods", &self.allow_methods);
        res.set_header("Access-Control-Allow-Headers", &self.allow_headers);
    }

    fn name(&self) -> &'static str {
        "CorsMiddleware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;

    fn request_with_id(id: &str) -> HttpRequest {
        let mut req = HttpRequest::new(Method::Get, "/users", HashMap::new(), None);
        req.set_header("x-request-id", id);
        req
    }

    struct Deny;

    impl Middleware for Deny {
        fn before_request(&self, _req: &HttpRequest) -> MiddlewareResult {
            MiddlewareResult::Respond(HttpResponse::error(403, "Forbidden"))
        }

        fn name(&self) -> &'static str {
            "Deny"
        }
    }

    #[test]
    fn test_chain_order() {
        let mut chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        chain.add(LoggingMiddleware::new());
        chain.add(TimingMiddleware::new());
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.names(), vec!["LoggingMiddleware", "TimingMiddleware"]);
    }

    #[test]
    fn test_short_circuit() {
        let mut chain = MiddlewareChain::new();
        chain.add(Deny);
        chain.add(LoggingMiddleware::new());

        match chain.run_before(&request_with_id("r1")) {
            MiddlewareResult::Respond(resp) => assert_eq!(resp.status, 403),
            MiddlewareResult::Continue => panic!("expected short-circuit"),
        }
    }

    #[test]
    fn test_timing_clears_entry() {
        let timing = TimingMiddleware::new();
        let req = request_with_id("r2");
        timing.before_request(&req);
        assert_eq!(timing.in_flight(), 1);

        let mut res = HttpResponse::json("{}");
        timing.after_response(&req, &mut res);
        assert_eq!(timing.in_flight(), 0);
    }

    #[test]
    fn test_cors_headers() {
        let cors = CorsMiddleware::new().allow_origin("https://example.com");
        assert_eq!(cors.origin(), "https://example.com");

        let mut res = HttpResponse::json("{}");
        cors.after_response(&request_with_id("r3"), &mut res);
        assert_eq!(
            res.header("access-control-allow-origin"),
            Some("https://example.com")
        );
        assert!(res.header("access-control-allow-methods").is_some());
    }
}
