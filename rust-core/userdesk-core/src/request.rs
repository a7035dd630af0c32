//! # HTTP Request
//!
//! Owned request handed to handlers: method, path, decoded query, headers,
//! collected body, plus what the server attached on the way in (path
//! parameters, validated token claims, app state).

use crate::error::{Error, Result};
use crate::json::parse_json_bytes;
use crate::params::PathParams;
use crate::router::Method;
use crate::state::TypeState;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// HTTP request as seen by handlers
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    query_string: Option<String>,
    query_params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    params: PathParams,
    claims: Option<Value>,
    state: TypeState,
}

impl HttpRequest {
    /// Build a request by hand (tests, in-process dispatch)
    ///
    /// `path` may carry a query string. Invalid header names or values
    /// are skipped.
    pub fn new(
        method: Method,
        path: impl Into<String>,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let path = path.into();
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut header_map = HeaderMap::new();
        for (k, v) in headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(k.as_bytes()),
                HeaderValue::from_str(&v),
            ) {
                header_map.insert(name, value);
            }
        }

        Self::from_parts(method, path, query_string, header_map, body)
    }

    fn from_parts(
        method: Method,
        path: String,
        query_string: Option<String>,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Self {
        let query_params = parse_query_string(query_string.as_deref());
        Self {
            method,
            path,
            query_string,
            query_params,
            headers,
            body,
            params: PathParams::new(),
            claims: None,
            state: TypeState::new(),
        }
    }

    /// Convert a hyper request, collecting the body up to `max_body_size`
    ///
    /// # Errors
    ///
    /// - `Error::MethodNotAllowed` for methods the router cannot route
    /// - `Error::PayloadTooLarge` if `Content-Length` or the collected
    ///   body exceeds the limit
    /// - `Error::Http` if the body stream fails
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from_http(req.method()).ok_or_else(|| Error::MethodNotAllowed {
            method: req.method().to_string(),
        })?;

        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(actual) = declared.filter(|len| *len > max_body_size) {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual,
            });
        }

        let (parts, body) = req.into_parts();
        let bytes = body.collect().await?.to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }

        Ok(Self::from_parts(
            method,
            parts.uri.path().to_string(),
            parts.uri.query().map(String::from),
            parts.headers,
            (!bytes.is_empty()).then_some(bytes),
        ))
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Bearer token from the `Authorization` header
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("authorization")
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// All headers with text values
    #[must_use]
    pub fn headers_map(&self) -> HashMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| {
                v.to_str()
                    .ok()
                    .map(|val| (k.as_str().to_string(), val.to_string()))
            })
            .collect()
    }

    /// Decoded query parameter by name
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// All decoded query parameters
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Body bytes, `None` when the body was empty
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Body as UTF-8 text
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Deserialize the body as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidJson` when the body is missing or does not
    /// deserialize into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let mut bytes = self
            .body_bytes()
            .ok_or_else(|| Error::InvalidJson {
                reason: "request body is empty".to_string(),
            })?
            .to_vec();
        parse_json_bytes(&mut bytes)
    }

    /// Path parameters of the matched route
    #[must_use]
    pub const fn params(&self) -> &PathParams {
        &self.params
    }

    /// Attach path parameters (done by the server after routing)
    pub fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Claims of a validated bearer token
    #[must_use]
    pub const fn claims(&self) -> Option<&Value> {
        self.claims.as_ref()
    }

    /// Attach validated token claims
    pub fn set_claims(&mut self, claims: Value) {
        self.claims = Some(claims);
    }

    /// App-scoped dependencies
    #[must_use]
    pub const fn state(&self) -> &TypeState {
        &self.state
    }

    /// Attach the app state (done by the server)
    pub fn set_state(&mut self, state: TypeState) {
        self.state = state;
    }
}

/// Parse a query string; last duplicate wins
fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Percent-decoding with `+` as space; malformed escapes pass through
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let decoded = s
                    .get(i + 1..i + 3)
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = decoded {
                    out.push(byte);
                    i += 2;
                } else {
                    out.push(b'%');
                }
            }
            b => out.push(b),
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
