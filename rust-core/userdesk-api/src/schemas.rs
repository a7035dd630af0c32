//! # Schemas
//!
//! Request and response models. Request schemas deserialize from the JSON
//! body and implement [`Validate`]; a malformed body or a failed check is
//! answered with 422.

use crate::models::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use userdesk_core::validation::{check_email, check_length};
use userdesk_core::{FieldError, Validate, ValidationErrors, ValidationResult};

/// Username length bounds, in characters
pub const USERNAME_LEN: (usize, usize) = (3, 50);
/// Password length bounds, in characters
pub const PASSWORD_LEN: (usize, usize) = (8, 128);
/// Largest page `GET /users` will return
pub const MAX_PAGE_SIZE: i64 = 1000;
/// Page size when `limit` is not given
pub const DEFAULT_PAGE_SIZE: i64 = 100;

fn default_true() -> bool {
    true
}

fn check_username(value: &str) -> Result<(), FieldError> {
    check_length("username", value, USERNAME_LEN.0, USERNAME_LEN.1)
}

fn check_password(value: &str) -> Result<(), FieldError> {
    check_length("password", value, PASSWORD_LEN.0, PASSWORD_LEN.1)
}

/// Body of `POST /users`
#[derive(Debug, Clone, Deserialize)]
pub struct UserCreate {
    /// Email address
    pub email: String,
    /// Display handle
    pub username: String,
    /// Plaintext password, hashed before storage
    pub password: String,
    /// Defaults to true
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl Validate for UserCreate {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        errors.check(check_email("email", &self.email));
        errors.check(check_username(&self.username));
        errors.check(check_password(&self.password));
        errors.into_result()
    }
}

/// Body of `PUT`/`PATCH /users/{id}`: only supplied fields are copied
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    /// New email
    pub email: Option<String>,
    /// New username
    pub username: Option<String>,
    /// New plaintext password
    pub password: Option<String>,
    /// New active flag
    pub is_active: Option<bool>,
}

impl Validate for UserUpdate {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        if let Some(email) = &self.email {
            errors.check(check_email("email", email));
        }
        if let Some(username) = &self.username {
            errors.check(check_username(username));
        }
        if let Some(password) = &self.password {
            errors.check(check_password(password));
        }
        errors.into_result()
    }
}

/// User as returned to clients; carries no password material
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    /// Primary key
    pub id: i64,
    /// Email address
    pub email: String,
    /// Display handle
    pub username: String,
    /// Active flag
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

/// Paging for `GET /users`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams {
    /// Rows to skip
    pub skip: i64,
    /// Max rows to return
    pub limit: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListParams {
    /// Read `skip` and `limit` from decoded query parameters
    ///
    /// # Errors
    ///
    /// Non-integers, a negative `skip` or a `limit` outside `1..=1000`.
    pub fn from_query(query: &HashMap<String, String>) -> ValidationResult<Self> {
        let mut errors = ValidationErrors::new();
        let mut params = Self::default();

        let mut read = |name: &str, min: i64, max: i64| -> Option<i64> {
            let raw = query.get(name)?;
            match raw.trim().parse::<i64>() {
                Ok(v) if v < min => errors.add(FieldError::too_small(name, min)),
                Ok(v) if v > max => errors.add(FieldError::too_large(name, max)),
                Ok(v) => return Some(v),
                Err(_) => errors.add(FieldError::invalid_type(name, "an integer")),
            }
            None
        };

        if let Some(skip) = read("skip", 0, i64::MAX) {
            params.skip = skip;
        }
        if let Some(limit) = read("limit", 1, MAX_PAGE_SIZE) {
            params.limit = limit;
        }

        errors.into_result().map(|()| params)
    }
}

/// Body of `POST /auth/token`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// Account email
    pub email: String,
    /// Plaintext password
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();
        errors.check(check_email("email", &self.email));
        if self.password.is_empty() {
            errors.add_required("password");
        }
        errors.into_result()
    }
}

/// Answer of `POST /auth/token`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed JWT
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    /// Lifetime in seconds
    pub expires_in: u64,
}

impl TokenResponse {
    /// Bearer token response
    pub fn bearer(access_token: String, expires_in: u64) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use userdesk_core::ValidationCode;

    fn create(email: &str, username: &str, password: &str) -> UserCreate {
        UserCreate {
            email: email.into(),
            username: username.into(),
            password: password.into(),
            is_active: true,
        }
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_user_create_defaults_active() {
        let body: UserCreate = serde_json::from_str(
            r#"{"email":"ada@example.com","username":"ada","password":"correct horse"}"#,
        )
        .unwrap();
        assert!(body.is_active);
        assert!(body.validate().is_ok());
    }

    #[test]
    fn test_user_create_reports_every_field() {
        let errors = create("not-an-email", "ab", "short").validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        let by_field = errors.by_field();
        assert_eq!(by_field["email"][0].code, ValidationCode::InvalidFormat);
        assert_eq!(by_field["username"][0].code, ValidationCode::TooShort);
        assert_eq!(by_field["password"][0].code, ValidationCode::TooShort);
    }

    #[test]
    fn test_username_upper_bound() {
        let long = "x".repeat(51);
        let errors = create("ada@example.com", &long, "correct horse")
            .validate()
            .unwrap_err();
        assert_eq!(errors.by_field()["username"][0].code, ValidationCode::TooLong);
    }

    #[test]
    fn test_update_validates_only_present_fields() {
        assert!(UserUpdate::default().validate().is_ok());

        let update = UserUpdate {
            username: Some("x".into()),
            ..UserUpdate::default()
        };
        let errors = update.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_response_has_no_password() {
        let response = UserResponse {
            id: 1,
            email: "ada@example.com".into(),
            username: "ada".into(),
            is_active: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(response).unwrap();
        let keys: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !k.contains("password")));
    }

    #[test]
    fn test_list_params_defaults_and_bounds() {
        assert_eq!(ListParams::from_query(&query(&[])).unwrap(), ListParams::default());

        let params = ListParams::from_query(&query(&[("skip", "20"), ("limit", "5")])).unwrap();
        assert_eq!(params, ListParams { skip: 20, limit: 5 });

        assert!(ListParams::from_query(&query(&[("skip", "-1")])).is_err());
        assert!(ListParams::from_query(&query(&[("limit", "0")])).is_err());
        assert!(ListParams::from_query(&query(&[("limit", "1001")])).is_err());

        let errors =
            ListParams::from_query(&query(&[("skip", "ten"), ("limit", "x")])).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_token_response_shape() {
        let token = TokenResponse::bearer("abc".into(), 3600);
        let json = serde_json::to_value(token).unwrap();
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["expires_in"], 3600);
    }
}
