//! # Route Metadata
//!
//! What the router remembers about one registered route.

use crate::params::{parse_segment, ParamKind};
use crate::router::HandlerId;
use std::collections::HashMap;

/// Registered route: handler id, declared parameter kinds and auth flag
#[derive(Debug, Clone)]
pub struct RouteSpec {
    /// Handler identifier assigned at registration
    pub handler_id: HandlerId,
    /// Pattern as written (e.g. "/users/{id:int}")
    pub pattern: String,
    /// Pattern handed to matchit (e.g. "/users/{id}")
    pub match_pattern: String,
    /// Declared kind per parameter name
    pub kinds: HashMap<String, ParamKind>,
    /// Whether a valid bearer token is required
    pub auth_required: bool,
}

impl RouteSpec {
    /// Build route metadata from a pattern
    #[must_use]
    pub fn new(handler_id: HandlerId, pattern: &str, auth_required: bool) -> Self {
        let (match_pattern, kinds) = normalize(pattern);

        Self {
            handler_id,
            pattern: pattern.to_string(),
            match_pattern,
            kinds,
            auth_required,
        }
    }

    /// Declared kind of a parameter, `Str` when undeclared
    #[must_use]
    pub fn kind_of(&self, name: &str) -> ParamKind {
        self.kinds.get(name).copied().unwrap_or_default()
    }
}

/// Strip `:kind` suffixes so matchit sees plain `{name}` captures
fn normalize(pattern: &str) -> (String, HashMap<String, ParamKind>) {
    let mut kinds = HashMap::new();
    let segments: Vec<String> = pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match parse_segment(segment) {
            Some((name, kind)) => {
                let normalized = format!("{{{name}}}");
                kinds.insert(name, kind);
                normalized
            }
            None => segment.to_string(),
        })
        .collect();

    if segments.is_empty() {
        ("/".to_string(), kinds)
    } else {
        (format!("/{}", segments.join("/")), kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_route() {
        let spec = RouteSpec::new(0, "/users", false);
        assert_eq!(spec.match_pattern, "/users");
        assert!(spec.kinds.is_empty());
        assert!(!spec.auth_required);
    }

    #[test]
    fn test_typed_param_is_normalized() {
        let spec = RouteSpec::new(3, "/users/{id:int}", true);
        assert_eq!(spec.match_pattern, "/users/{id}");
        assert_eq!(spec.kind_of("id"), ParamKind::Int);
        assert!(spec.auth_required);
    }

    #[test]
    fn test_undeclared_kind_defaults_to_str() {
        let spec = RouteSpec::new(0, "/users/{name}", false);
        assert_eq!(spec.kind_of("name"), ParamKind::Str);
        assert_eq!(spec.kind_of("missing"), ParamKind::Str);
    }

    #[test]
    fn test_root_route() {
        let spec = RouteSpec::new(0, "/", false);
        assert_eq!(spec.match_pattern, "/");
    }
}
