//! # HTTP Response
//!
//! Buffered response built by handlers and middleware, converted to a
//! hyper response at the connection boundary.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde::Serialize;
use std::collections::HashMap;

const JSON: &str = "application/json";

/// Response produced by a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type (kept apart from `headers`)
    pub content_type: String,
    /// Other response headers
    pub headers: HashMap<String, String>,
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::json(String::new())
    }
}

impl HttpResponse {
    /// 200 with a pre-serialized JSON body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: JSON.to_string(),
            headers: HashMap::new(),
        }
    }

    /// JSON response serialized from `value`
    ///
    /// Falls back to a 500 if serialization fails.
    #[must_use]
    pub fn json_value<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json(body).with_status(status),
            Err(e) => {
                tracing::error!(error = %e, "response serialization failed");
                Self::error(500, "Internal Server Error")
            }
        }
    }

    /// `{"error": message}` with the given status
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(serde_json::json!({ "error": message }).to_string()).with_status(status)
    }

    /// 200 plain text
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: "text/plain".to_string(),
            headers: HashMap::new(),
        }
    }

    /// 204 No Content
    #[must_use]
    pub fn no_content() -> Self {
        Self::text(String::new()).with_status(204)
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header (builder form)
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body back as JSON (tests, middleware)
    ///
    /// # Errors
    ///
    /// Returns the serde error if the body is not JSON.
    pub fn json_body(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.body)
    }

    /// Convert to a hyper response
    ///
    /// 204 responses carry no body and no content type.
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = hyper::Response::builder().status(status);

        let body = if status == StatusCode::NO_CONTENT {
            Bytes::new()
        } else {
            builder = builder.header(hyper::header::CONTENT_TYPE, &self.content_type);
            Bytes::from(self.body)
        };
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder.body(Full::new(body)).unwrap_or_else(|e| {
            tracing::error!(error = %e, "invalid response parts");
            let mut fallback =
                hyper::Response::new(Full::new(Bytes::from("Internal Server Error")));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let resp = HttpResponse::json(r#"{"status": "ok"}"#);
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "application/json");
    }

    #[test]
    fn test_error_body() {
        let resp = HttpResponse::error(404, "User not found");
        assert_eq!(resp.status, 404);
        assert_eq!(resp.json_body().unwrap()["error"], "User not found");
    }

    #[test]
    fn test_json_value() {
        let resp = HttpResponse::json_value(201, &serde_json::json!({"id": 1}));
        assert_eq!(resp.status, 201);
        assert_eq!(resp.body, r#"{"id":1}"#);
    }

    #[test]
    fn test_headers_case_insensitive() {
        let resp = HttpResponse::text("x")
            .with_header("X-Request-Id", "abc")
            .with_header("Content-Type", "text/html");
        assert_eq!(resp.header("x-request-id"), Some("abc"));
        assert_eq!(resp.content_type, "text/html");
        assert!(!resp.headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_no_content_into_hyper() {
        let resp = HttpResponse::no_content().into_hyper();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert!(resp.headers().get(hyper::header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_invalid_status_becomes_500() {
        let resp = HttpResponse::text("x").with_status(42).into_hyper();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
