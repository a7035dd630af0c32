//! # HTTP Server
//!
//! HTTP/1.1 server built on Hyper and Tokio.
//!
//! ## Key Features
//!
//! - One task per connection, keep-alive support
//! - Request ids, routing, 404/405 answers, bearer-token checks
//! - Middleware chain around every handler
//! - App state handed to every request
//! - Graceful shutdown on Ctrl-C with a bounded drain
//! - `test_request` for in-process dispatch without a socket

use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::router::{Method, Router};
use crate::state::TypeState;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Bearer-token validation settings (HS256 shared secret)
#[derive(Clone)]
pub struct AuthConfig {
    /// JWT decoding key
    pub decoding_key: DecodingKey,
    /// JWT validation settings (`exp` is required)
    pub validation: Validation,
}

impl AuthConfig {
    /// Validation for tokens signed with `secret`
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub address: SocketAddr,
    /// Keep connections alive between requests
    pub keep_alive: bool,
    /// How long shutdown waits for in-flight connections
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 8000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = HttpResponse> + Send>>;

/// Route handler: owns its request, answers with a response
pub type Handler = Arc<dyn Fn(HttpRequest) -> HandlerFuture + Send + Sync>;

/// Wrap an async function as a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Everything needed to answer a request, shared by all connections
#[derive(Clone, Default)]
struct Dispatcher {
    router: Router,
    handlers: Vec<Handler>,
    auth_config: Option<Arc<AuthConfig>>,
    middleware: MiddlewareChain,
    state: TypeState,
}

impl Dispatcher {
    async fn dispatch(&self, mut req: HttpRequest) -> HttpResponse {
        if req.header("x-request-id").is_none() {
            req.set_header("x-request-id", &generate_request_id());
        }
        let request_id = req.header("x-request-id").unwrap_or_default().to_string();

        let mut response = match self.route(&mut req) {
            Ok(handler) => match self.middleware.run_before(&req) {
                MiddlewareResult::Continue => handler(req.clone()).await,
                MiddlewareResult::Respond(resp) => resp,
            },
            Err(resp) => resp,
        };

        response.set_header("x-request-id", &request_id);
        self.middleware.run_after(&req, &mut response);
        response
    }

    /// Resolve the handler and attach params, claims and state
    fn route(&self, req: &mut HttpRequest) -> std::result::Result<&Handler, HttpResponse> {
        let Ok(matched) = self.router.match_route(req.method, &req.path) else {
            let allowed = self.router.allowed_methods(&req.path);
            if allowed.is_empty() {
                return Err(HttpResponse::error(404, "Not Found"));
            }
            let allow: Vec<&str> = allowed.iter().map(|m| m.as_str()).collect();
            return Err(HttpResponse::error(405, "Method Not Allowed")
                .with_header("Allow", &allow.join(", ")));
        };

        if matched.auth_required {
            self.authenticate(req)?;
        }

        let handler = self.handlers.get(matched.handler_id).ok_or_else(|| {
            error!(handler_id = matched.handler_id, "route has no handler");
            HttpResponse::error(500, "Internal Server Error")
        })?;

        req.set_params(matched.params);
        req.set_state(self.state.clone());
        Ok(handler)
    }

    fn authenticate(&self, req: &mut HttpRequest) -> std::result::Result<(), HttpResponse> {
        let Some(config) = self.auth_config.as_deref() else {
            error!("Route requires auth but server has no JWT secret configured");
            return Err(HttpResponse::error(
                500,
                "Server misconfigured: Auth required but no secret set",
            ));
        };
        let Some(token) = req.bearer_token() else {
            return Err(HttpResponse::error(401, "Missing or invalid Authorization header")
                .with_header("WWW-Authenticate", "Bearer"));
        };

        match decode::<serde_json::Value>(token, &config.decoding_key, &config.validation) {
            Ok(token_data) => {
                req.set_claims(token_data.claims);
                Ok(())
            }
            Err(e) => {
                warn!("JWT validation failed: {}", e);
                Err(HttpResponse::error(401, "Unauthorized")
                    .with_header("WWW-Authenticate", "Bearer"))
            }
        }
    }
}

/// HTTP server
pub struct Server {
    config: ServerConfig,
    dispatcher: Dispatcher,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Server with default configuration and no routes
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            dispatcher: Dispatcher::default(),
        }
    }

    /// Set the bind address
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Current configuration
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Set how long shutdown waits for in-flight connections
    pub fn set_shutdown_timeout(&mut self, timeout: Duration) {
        self.config.shutdown_timeout = timeout;
    }

    /// Validate bearer tokens signed with `secret` on protected routes
    pub fn enable_auth(&mut self, secret: &str) {
        self.dispatcher.auth_config = Some(Arc::new(AuthConfig::new(secret)));
    }

    /// Register an app-scoped dependency, resolvable by type in handlers
    pub fn manage<T: Send + Sync + 'static>(&mut self, value: T) {
        self.dispatcher.state.set(value);
    }

    /// App state shared with every request
    #[must_use]
    pub const fn state(&self) -> &TypeState {
        &self.dispatcher.state
    }

    /// Append a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.dispatcher.middleware.add(middleware);
    }

    /// Names of registered middlewares, in order
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.dispatcher.middleware.names()
    }

    /// Register a route and its handler
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the router rejects the pattern.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        handler: Handler,
        auth_required: bool,
    ) -> Result<()> {
        let id = self.dispatcher.router.add_route(method, path, auth_required)?;
        debug_assert_eq!(id, self.dispatcher.handlers.len());
        self.dispatcher.handlers.push(handler);
        Ok(())
    }

    /// Serve until Ctrl-C
    ///
    /// # Errors
    ///
    /// Returns `Error::BindError` if the address cannot be bound and
    /// `Error::Io` if accepting fails.
    pub async fn serve(&self) -> Result<()> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then drain in-flight connections
    ///
    /// # Errors
    ///
    /// See [`Server::serve`].
    pub async fn serve_with_shutdown<S>(&self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        let addr = self.config.address;
        let listener = bind_listener(addr).map_err(|source| Error::BindError {
            address: addr.to_string(),
            source,
        })?;

        info!("Server listening on http://{}", addr);

        let dispatcher = Arc::new(self.dispatcher.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        tokio::pin!(signal);
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);
                    let dispatcher = dispatcher.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req| {
                            let dispatcher = dispatcher.clone();
                            async move {
                                handle_request(req, &dispatcher, remote_addr, max_body_size).await
                            }
                        });
                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }

                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut signal => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            warn!(
                remaining = active.load(Ordering::Relaxed),
                "Shutdown timeout reached with connections still open"
            );
        }
        Ok(())
    }

    /// Dispatch a request in-process, without the network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> HttpResponse {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return HttpResponse::error(413, "Payload Too Large");
            }
        }
        let mut req = HttpRequest::new(method, path, headers, body);
        req.set_header("x-client-ip", "test");

        self.dispatcher.dispatch(req).await
    }
}

fn bind_listener(addr: SocketAddr) -> std::io::Result<tokio::net::TcpListener> {
    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl-C handler; serving until killed");
        std::future::pending::<()>().await;
    }
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    dispatcher: &Dispatcher,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> std::result::Result<hyper::Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let version = req.version();

    let response = match HttpRequest::from_hyper_with_limit(req, max_body_size).await {
        Ok(mut request) => {
            request.set_header("x-client-ip", &remote_addr.ip().to_string());
            dispatcher.dispatch(request).await
        }
        Err(Error::PayloadTooLarge { limit, actual }) => {
            warn!(limit, actual, "Request body rejected");
            HttpResponse::error(413, "Payload Too Large")
        }
        Err(Error::MethodNotAllowed { method }) => {
            warn!(%method, "Unsupported method");
            HttpResponse::error(405, "Method Not Allowed")
        }
        Err(e) => {
            error!("Failed to parse request: {}", e);
            HttpResponse::error(400, "Bad Request")
        }
    };

    info!(
        "    {} - \"{} {} {:?}\" {}",
        remote_addr, method, path, version, response.status
    );
    Ok(response.into_hyper())
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}
