//! Request gates for protected routes.
//!
//! `require_authenticated` validates the bearer token and stores the caller's
//! [`Principal`] in the request extensions. It reads the shared
//! `Arc<TokenService>` from an `Extension` layer wrapping the router.
//! `require_admin` must be layered inside it and only reads that principal;
//! it never looks at a token.

use axum::{
    extract::{Extension, Request},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use super::{
    models::Role,
    token::{TokenError, TokenService},
};
use crate::error::ErrorBody;

/// Identity attached to an authenticated request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub role: String,
}

impl Principal {
    #[must_use]
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role.as_str()
    }
}

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header")]
    MalformedHeader,
    #[error("Invalid token")]
    InvalidToken(#[source] TokenError),
    #[error("admin access required")]
    Forbidden,
}

impl GuardError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidToken(err) if err.is_internal() => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingHeader | Self::MalformedHeader | Self::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Token verification failed: {self:?}");
            return (status, Json(ErrorBody::new("internal server error"))).into_response();
        }
        debug!("Request rejected: {self:?}");
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Validate a raw `Authorization` header value.
///
/// The value must be exactly two whitespace-separated parts: the scheme
/// `Bearer` (any case) and the token.
///
/// # Errors
/// - `GuardError::MissingHeader` when `header` is `None` or blank
/// - `GuardError::MalformedHeader` when the shape is wrong
/// - `GuardError::InvalidToken` when verification fails
pub fn authenticate(tokens: &TokenService, header: Option<&str>) -> Result<Principal, GuardError> {
    let header = header
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(GuardError::MissingHeader)?;

    let parts: Vec<&str> = header.split_whitespace().collect();
    let [scheme, token] = parts.as_slice() else {
        return Err(GuardError::MalformedHeader);
    };
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(GuardError::MalformedHeader);
    }

    let claims = tokens.verify(token).map_err(GuardError::InvalidToken)?;
    Ok(Principal {
        username: claims.username,
        role: claims.role,
    })
}

/// Check the principal left by [`require_authenticated`].
///
/// # Errors
/// `GuardError::Forbidden` when there is no principal or its role differs.
pub fn require_role(principal: Option<&Principal>, role: Role) -> Result<(), GuardError> {
    match principal {
        Some(principal) if principal.has_role(role) => Ok(()),
        _ => Err(GuardError::Forbidden),
    }
}

pub async fn require_authenticated(
    Extension(tokens): Extension<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header = match request.headers().get(AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(value) => Some(value),
            Err(_) => return GuardError::MalformedHeader.into_response(),
        },
    };

    match authenticate(&tokens, header) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

pub async fn require_admin(request: Request, next: Next) -> Response {
    match require_role(request.extensions().get::<Principal>(), Role::Admin) {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Account;
    use axum::{
        body::{to_bytes, Body},
        middleware,
        routing::get,
        Router,
    };
    use secrecy::SecretString;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn tokens() -> TokenService {
        TokenService::new(SecretString::from("guard-test-secret".to_string()))
    }

    fn account(role: Role) -> Account {
        Account {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            role,
        }
    }

    fn bearer(tokens: &TokenService, role: Role) -> Result<String, TokenError> {
        Ok(format!("Bearer {}", tokens.issue(&account(role))?))
    }

    #[test]
    fn valid_header_yields_principal() -> Result<(), Box<dyn std::error::Error>> {
        let tokens = tokens();
        let header = bearer(&tokens, Role::User)?;
        let principal = authenticate(&tokens, Some(&header))?;
        assert_eq!(principal.username, "alice");
        assert_eq!(principal.role, "user");
        assert!(!principal.has_role(Role::Admin));
        Ok(())
    }

    #[test]
    fn scheme_is_case_insensitive() -> Result<(), Box<dyn std::error::Error>> {
        let tokens = tokens();
        let token = tokens.issue(&account(Role::Admin))?;
        let principal = authenticate(&tokens, Some(&format!("bEaReR {token}")))?;
        assert!(principal.has_role(Role::Admin));
        Ok(())
    }

    #[test]
    fn missing_header_is_rejected() {
        let tokens = tokens();
        assert!(matches!(
            authenticate(&tokens, None),
            Err(GuardError::MissingHeader)
        ));
        assert!(matches!(
            authenticate(&tokens, Some("   ")),
            Err(GuardError::MissingHeader)
        ));
    }

    #[test]
    fn malformed_headers_are_rejected() {
        let tokens = tokens();
        for header in ["Bearer", "Basic abc", "Bearer a b", "token-only"] {
            assert!(
                matches!(
                    authenticate(&tokens, Some(header)),
                    Err(GuardError::MalformedHeader)
                ),
                "{header}"
            );
        }
    }

    #[test]
    fn foreign_token_is_invalid() -> Result<(), TokenError> {
        let other = TokenService::new(SecretString::from("someone-else".to_string()));
        let header = bearer(&other, Role::Admin)?;
        let result = authenticate(&tokens(), Some(&header));
        assert!(matches!(result, Err(GuardError::InvalidToken(_))));
        Ok(())
    }

    #[test]
    fn require_role_checks_attached_role() {
        let admin = Principal {
            username: "root".to_string(),
            role: "admin".to_string(),
        };
        let user = Principal {
            username: "alice".to_string(),
            role: "user".to_string(),
        };
        assert!(require_role(Some(&admin), Role::Admin).is_ok());
        assert!(matches!(
            require_role(Some(&user), Role::Admin),
            Err(GuardError::Forbidden)
        ));
        assert!(matches!(
            require_role(None, Role::Admin),
            Err(GuardError::Forbidden)
        ));
    }

    #[test]
    fn statuses() {
        assert_eq!(GuardError::MissingHeader.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GuardError::MalformedHeader.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            GuardError::InvalidToken(TokenError::Expired).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(GuardError::Forbidden.status(), StatusCode::FORBIDDEN);
    }

    async fn whoami(Extension(principal): Extension<Principal>) -> String {
        principal.username
    }

    fn app(tokens: Arc<TokenService>) -> Router {
        let admin = Router::new()
            .route("/admin", get(whoami))
            .route_layer(middleware::from_fn(require_admin))
            .route_layer(middleware::from_fn(require_authenticated));
        Router::new()
            .route("/me", get(whoami))
            .route_layer(middleware::from_fn(require_authenticated))
            .merge(admin)
            .layer(Extension(tokens))
    }

    fn request(uri: &str, header: Option<&str>) -> Result<Request, axum::http::Error> {
        let mut builder = axum::http::Request::builder().uri(uri);
        if let Some(header) = header {
            builder = builder.header(AUTHORIZATION, header);
        }
        builder.body(Body::empty())
    }

    #[tokio::test]
    async fn middleware_attaches_principal() -> Result<(), Box<dyn std::error::Error>> {
        let tokens = Arc::new(tokens());
        let header = bearer(&tokens, Role::User)?;
        let response = app(tokens).oneshot(request("/me", Some(&header))?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert_eq!(&body[..], b"alice");
        Ok(())
    }

    #[tokio::test]
    async fn middleware_rejects_missing_header_with_json(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let response = app(Arc::new(tokens())).oneshot(request("/me", None)?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        assert_eq!(value["error"], "Missing Authorization header");
        Ok(())
    }

    #[tokio::test]
    async fn admin_gate_forbids_users_and_admits_admins(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let tokens = Arc::new(tokens());

        let user = bearer(&tokens, Role::User)?;
        let response = app(tokens.clone())
            .oneshot(request("/admin", Some(&user))?)
            .await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = bearer(&tokens, Role::Admin)?;
        let response = app(tokens).oneshot(request("/admin", Some(&admin))?).await?;
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn admin_gate_authenticates_first() -> Result<(), Box<dyn std::error::Error>> {
        let response = app(Arc::new(tokens()))
            .oneshot(request("/admin", None)?)
            .await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }
}
