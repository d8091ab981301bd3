//! `/register`, `/login` and `/promote/{username}`.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

use super::{bad_request, ErrorBody};
use crate::{
    auth::{Account, AccountWithToken, Credentials, TokenService, UserDirectory},
    error::{Error, Result},
};

const CREDENTIALS_REQUIRED: &str = "username and password required";

fn issue(tokens: &TokenService, account: Account) -> Result<AccountWithToken> {
    let token = tokens.issue(&account)?;
    Ok(AccountWithToken::new(account, token))
}

#[utoipa::path(
    post,
    path= "/register",
    request_body = Credentials,
    responses (
        (status = 201, description = "Account created; the first account is admin", body = AccountWithToken),
        (status = 400, description = "Missing username or password", body = ErrorBody),
        (status = 409, description = "Username already exists", body = ErrorBody),
    ),
    tag= "auth"
)]
pub async fn register(
    directory: Extension<Arc<UserDirectory>>,
    tokens: Extension<Arc<TokenService>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Ok(Json(credentials)) = payload else {
        return bad_request(CREDENTIALS_REQUIRED);
    };

    let created = directory
        .create_account(&credentials.username, &credentials.password)
        .await
        .and_then(|account| issue(&tokens, account));

    match created {
        Ok(body) => (StatusCode::CREATED, Json(body)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "Authenticated", body = AccountWithToken),
        (status = 400, description = "Missing username or password", body = ErrorBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
    ),
    tag= "auth"
)]
pub async fn login(
    directory: Extension<Arc<UserDirectory>>,
    tokens: Extension<Arc<TokenService>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Response {
    let Ok(Json(credentials)) = payload else {
        return bad_request(CREDENTIALS_REQUIRED);
    };
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return bad_request(CREDENTIALS_REQUIRED);
    }

    let authenticated = directory
        .authenticate(&credentials.username, &credentials.password)
        .await
        .and_then(|account| issue(&tokens, account));

    match authenticated {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(err) => {
            debug!("Login failed for {}: {err}", credentials.username);
            err.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path= "/promote/{username}",
    params(("username" = String, Path, description = "Account to promote")),
    responses (
        (status = 200, description = "Account is now admin", body = Account),
        (status = 401, description = "Missing or invalid token", body = ErrorBody),
        (status = 403, description = "Caller is not admin", body = ErrorBody),
        (status = 404, description = "User not found", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag= "auth"
)]
pub async fn promote(
    directory: Extension<Arc<UserDirectory>>,
    Path(username): Path<String>,
) -> Response {
    let username = username.trim();
    if username.is_empty() {
        return Error::validation("username required").into_response();
    }

    match directory.promote_to_admin(username).await {
        Ok(account) => (StatusCode::OK, Json(account)).into_response(),
        Err(err) => err.into_response(),
    }
}
