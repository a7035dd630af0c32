//! # JSON Serialization
//!
//! Parsing goes through simd-json, serialization through serde_json.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Parse a JSON string into `T`
///
/// # Errors
///
/// Returns `Error::InvalidJson` if the input is not valid JSON for `T`.
pub fn parse_json<T: DeserializeOwned>(json_str: &str) -> Result<T> {
    let mut bytes = json_str.as_bytes().to_vec();
    parse_json_bytes(&mut bytes)
}

/// Parse JSON bytes into `T`
///
/// simd-json parses in place, so the buffer is clobbered.
///
/// # Errors
///
/// Returns `Error::InvalidJson` if the input is not valid JSON for `T`.
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::InvalidJson {
        reason: e.to_string(),
    })
}

/// Serialize a value to a JSON string
///
/// # Errors
///
/// Returns `Error::InvalidJson` if `T`'s `Serialize` impl fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::InvalidJson {
        reason: format!("Serialize error: {e}"),
    })
}

/// Serialize a value to pretty-printed JSON
///
/// # Errors
///
/// Returns `Error::InvalidJson` if `T`'s `Serialize` impl fails.
pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::InvalidJson {
        reason: format!("Serialize error: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Account {
        email: String,
        active: bool,
    }

    #[test]
    fn test_parse_json_object() {
        let account: Account = parse_json(r#"{"email": "a@b.io", "active": true}"#).unwrap();
        assert_eq!(account.email, "a@b.io");
        assert!(account.active);
    }

    #[test]
    fn test_parse_json_missing_field() {
        let result: Result<Account> = parse_json(r#"{"email": "a@b.io"}"#);
        assert!(matches!(result, Err(Error::InvalidJson { .. })));
    }

    #[test]
    fn test_parse_json_bytes() {
        let mut bytes = br#"{"email": "c@d.io", "active": false}"#.to_vec();
        let account: Account = parse_json_bytes(&mut bytes).unwrap();
        assert_eq!(account.email, "c@d.io");
    }

    #[test]
    fn test_to_json_round_trip_fields() {
        let json = to_json(&Account {
            email: "e@f.io".to_string(),
            active: true,
        })
        .unwrap();
        assert!(json.contains("e@f.io"));
        assert!(to_json_pretty(&Vec::<u8>::new()).unwrap().contains("[]"));
    }

    #[test]
    fn test_invalid_json() {
        let result: Result<Account> = parse_json("not json");
        assert!(result.is_err());
    }
}
