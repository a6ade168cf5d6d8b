use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tower_cookies::Cookies;
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{db::ObjectId, error::AppError};

pub const TOKEN_COOKIE: &str = "jwt";

pub const AUTH_REQUIRED: &str = "Authentication required";
pub const INVALID_TOKEN: &str = "Invalid authentication token";

/// Identity of the caller, attached by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub ObjectId);

/// Gate for protected routes: verifies the `jwt` cookie and attaches the
/// caller's id to the request. Nothing is attached when verification fails.
pub async fn require_auth(
    State(keys): State<JwtKeys>,
    cookies: Cookies,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = cookies
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized(AUTH_REQUIRED.into()))?;

    let user_id = keys.verify(&token).map_err(|e| {
        warn!(error = ?e, "rejected session token");
        AppError::Unauthorized(INVALID_TOKEN.into())
    })?;

    req.extensions_mut().insert(AuthUser(user_id));
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(AUTH_REQUIRED.into()))
    }
}
