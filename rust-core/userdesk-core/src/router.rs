//! # Router
//!
//! Radix-trie routing on top of `matchit`, one tree per HTTP method.
//!
//! - Path parameters (`/users/{id}`)
//! - Typed parameters (`/users/{id:int}`, `/flags/{on:bool}`)
//! - Static segments win over parameters (`/users/me` before `/users/{id}`)

use crate::error::{Error, Result};
use crate::params::{convert, ParamValue, PathParams};
use crate::route::RouteSpec;
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP PATCH
    Patch,
    /// HTTP DELETE
    Delete,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// All routable methods, in `Allow` header order
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Upper-case method name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Parse a method name, case-insensitively
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(name))
    }

    /// Map a hyper method; extension methods are not routable
    #[must_use]
    pub fn from_http(method: &hyper::Method) -> Option<Self> {
        Self::parse(method.as_str())
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Result of a successful match
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Handler registered for the route
    pub handler_id: HandlerId,
    /// Extracted and converted path parameters
    pub params: PathParams,
    /// Whether a bearer token is required
    pub auth_required: bool,
}

#[derive(Clone)]
struct MethodRoutes {
    tree: MatchitRouter<HandlerId>,
    specs: HashMap<HandlerId, RouteSpec>,
}

impl MethodRoutes {
    fn new() -> Self {
        Self {
            tree: MatchitRouter::new(),
            specs: HashMap::new(),
        }
    }
}

/// Method-aware radix-trie router
#[derive(Clone, Default)]
pub struct Router {
    methods: HashMap<Method, MethodRoutes>,
    next_handler_id: HandlerId,
}

impl Router {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route and return its handler id
    ///
    /// Ids are assigned sequentially across all methods.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if matchit rejects the pattern,
    /// e.g. a duplicate or conflicting route for the same method.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: &str,
        auth_required: bool,
    ) -> Result<HandlerId> {
        let handler_id = self.next_handler_id;
        let spec = RouteSpec::new(handler_id, pattern, auth_required);

        let routes = self.methods.entry(method).or_insert_with(MethodRoutes::new);
        routes
            .tree
            .insert(spec.match_pattern.clone(), handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        routes.specs.insert(handler_id, spec);

        self.next_handler_id += 1;
        Ok(handler_id)
    }

    /// Match a request against the registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` when nothing is registered for the
    /// method and path.
    pub fn match_route(&self, method: Method, path: &str) -> Result<RouteMatch> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let routes = self.methods.get(&method).ok_or_else(not_found)?;
        let matched = routes.tree.at(path).map_err(|_| not_found())?;
        let handler_id = *matched.value;
        let spec = routes.specs.get(&handler_id).ok_or_else(not_found)?;

        let mut params = PathParams::new();
        for (name, raw) in matched.params.iter() {
            let value = convert(raw, spec.kind_of(name))
                .unwrap_or_else(|_| ParamValue::Str(raw.to_string()));
            params.insert(name, value);
        }

        Ok(RouteMatch {
            handler_id,
            params,
            auth_required: spec.auth_required,
        })
    }

    /// Methods that have a route matching `path`
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        Method::ALL
            .into_iter()
            .filter(|m| {
                self.methods
                    .get(m)
                    .is_some_and(|routes| routes.tree.at(path).is_ok())
            })
            .collect()
    }
}
