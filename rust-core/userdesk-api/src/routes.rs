//! # Routes
//!
//! HTTP handlers. Each one resolves its dependencies for the request,
//! makes one service call and renders the result; errors render through
//! [`ApiError::into_response`].

use crate::auth::subject_id;
use crate::dependencies::{database, token_issuer, user_service};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{
    ListParams, LoginRequest, TokenResponse, UserCreate, UserResponse, UserUpdate,
};
use serde::Serialize;
use tracing::warn;
use userdesk_core::{
    handler, FieldError, HttpRequest, HttpResponse, Method, Server, SessionMode, ValidationErrors,
};

fn respond<T: Serialize>(status: u16, result: ApiResult<T>) -> HttpResponse {
    match result {
        Ok(body) => HttpResponse::json_value(status, &body),
        Err(e) => e.into_response(),
    }
}

fn path_id(req: &HttpRequest) -> ApiResult<i64> {
    req.params().int("id").ok_or_else(|| {
        ValidationErrors::single(FieldError::invalid_type("id", "an integer")).into()
    })
}

/// `GET /health`
pub async fn health(req: HttpRequest) -> HttpResponse {
    let check = match database(&req) {
        Ok(pool) => pool.fetch_optional("SELECT 1 AS ok").await.map_err(ApiError::from),
        Err(e) => Err(e),
    };
    match check {
        Ok(_) => HttpResponse::json(r#"{"status":"ok"}"#),
        Err(e) => {
            warn!(error = %e, "health check failed");
            HttpResponse::error(503, "Service Unavailable")
        }
    }
}

/// `POST /users`
pub async fn create_user(req: HttpRequest) -> HttpResponse {
    let result = async {
        let input: UserCreate = req.json()?;
        let user = user_service(&req, SessionMode::Write)?.create_user(input).await?;
        Ok::<_, ApiError>(UserResponse::from(user))
    };
    respond(201, result.await)
}

/// `GET /users?skip=&limit=`
pub async fn list_users(req: HttpRequest) -> HttpResponse {
    let result = async {
        let params = ListParams::from_query(req.query_map())?;
        let users = user_service(&req, SessionMode::Read)?.list_users(params).await?;
        Ok::<_, ApiError>(users.into_iter().map(UserResponse::from).collect::<Vec<_>>())
    };
    respond(200, result.await)
}

/// `GET /users/me` (bearer token)
pub async fn current_user(req: HttpRequest) -> HttpResponse {
    let result = async {
        let id = subject_id(req.claims())?;
        let user = user_service(&req, SessionMode::Read)?.get_user(id).await?;
        Ok::<_, ApiError>(UserResponse::from(user))
    };
    respond(200, result.await)
}

/// `GET /users/{id}`
pub async fn get_user(req: HttpRequest) -> HttpResponse {
    let result = async {
        let id = path_id(&req)?;
        let user = user_service(&req, SessionMode::Read)?.get_user(id).await?;
        Ok::<_, ApiError>(UserResponse::from(user))
    };
    respond(200, result.await)
}

/// `PUT`/`PATCH /users/{id}`: only the supplied fields change
pub async fn update_user(req: HttpRequest) -> HttpResponse {
    let result = async {
        let id = path_id(&req)?;
        let input: UserUpdate = req.json()?;
        let user = user_service(&req, SessionMode::Write)?.update_user(id, input).await?;
        Ok::<_, ApiError>(UserResponse::from(user))
    };
    respond(200, result.await)
}

/// `DELETE /users/{id}`
pub async fn delete_user(req: HttpRequest) -> HttpResponse {
    let result = async {
        let id = path_id(&req)?;
        user_service(&req, SessionMode::Write)?.delete_user(id).await?;
        Ok::<_, ApiError>(())
    }
    .await;
    match result {
        Ok(()) => HttpResponse::no_content(),
        Err(e) => e.into_response(),
    }
}

/// `POST /auth/token`
pub async fn issue_token(req: HttpRequest) -> HttpResponse {
    let result = async {
        let issuer = token_issuer(&req)?;
        let input: LoginRequest = req.json()?;
        let user = user_service(&req, SessionMode::Read)?.authenticate(input).await?;
        let token = issuer.issue(&user)?;
        Ok::<_, ApiError>(TokenResponse::bearer(token, issuer.ttl_secs()))
    };
    respond(200, result.await)
}

/// Register every route on `server`
///
/// # Errors
///
/// Returns the router error if a pattern is rejected.
pub fn register(server: &mut Server) -> userdesk_core::Result<()> {
    server.add_route(Method::Get, "/health", handler(health), false)?;
    server.add_route(Method::Post, "/users", handler(create_user), false)?;
    server.add_route(Method::Get, "/users", handler(list_users), false)?;
    server.add_route(Method::Get, "/users/me", handler(current_user), true)?;
    server.add_route(Method::Get, "/users/{id:int}", handler(get_user), false)?;
    server.add_route(Method::Put, "/users/{id:int}", handler(update_user), false)?;
    server.add_route(Method::Patch, "/users/{id:int}", handler(update_user), false)?;
    server.add_route(Method::Delete, "/users/{id:int}", handler(delete_user), false)?;
    server.add_route(Method::Post, "/auth/token", handler(issue_token), false)?;
    Ok(())
}
