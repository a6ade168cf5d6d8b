use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::{info, instrument, warn};

use super::{
    dto::{ExitResponse, MessageResponse, SignInRequest, SignUpRequest},
    extractors::TOKEN_COOKIE,
    password,
};
use crate::{
    db::StoreError,
    error::{not_found, AppError},
    state::AppState,
    users::repo_types::{NewUser, User},
    validation::ValidJson,
};

/// Same text for unknown email and wrong password.
pub const BAD_CREDENTIALS: &str = "Incorrect email or password";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(create_user).fallback(not_found))
        .route("/signin", post(login).fallback(not_found))
        .route("/logout", delete(logout).fallback(not_found))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Unknown emails are verified against a dummy hash.
fn hash_to_check(user: Option<&User>) -> String {
    match user {
        Some(user) => user.password_hash.clone(),
        None => password::dummy_hash().to_string(),
    }
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<SignUpRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let hash = password::hash(payload.password).await?;
    let new_user = NewUser {
        email: normalize_email(&payload.email),
        password_hash: hash,
        name: payload.name,
        about: payload.about,
        avatar: payload.avatar,
    };

    let user = match state.users.create(new_user).await {
        Ok(user) => user,
        Err(StoreError::Duplicate) => {
            warn!("email already registered");
            return Err(AppError::Conflict(
                "A user with this email already exists".into(),
            ));
        }
        Err(StoreError::Invalid(reason)) => {
            warn!(%reason, "user record rejected");
            return Err(AppError::BadRequest("Invalid user data".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, cookies, payload))]
pub async fn login(
    State(state): State<AppState>,
    cookies: Cookies,
    ValidJson(payload): ValidJson<SignInRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = normalize_email(&payload.email);
    let user = state.users.find_by_email(&email).await?;
    let matches = password::verify(payload.password, hash_to_check(user.as_ref())).await?;

    let user = match user {
        Some(user) if matches => user,
        Some(user) => {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        }
        None => {
            warn!("login unknown email");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.into()));
        }
    };

    let token = state.keys.sign(&user.id)?;
    let cookie = Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(state.config.is_production())
        .max_age(state.keys.ttl())
        .build();
    cookies.add(cookie);

    info!(user_id = %user.id, "user logged in");
    Ok(Json(MessageResponse {
        message: "Authentication successful".into(),
    }))
}

/// Clears the session cookie. The token itself stays valid until it expires.
#[instrument(skip(cookies))]
pub async fn logout(cookies: Cookies) -> Json<ExitResponse> {
    cookies.remove(Cookie::build((TOKEN_COOKIE, "")).path("/").http_only(true).build());
    Json(ExitResponse {
        exit: "You have logged out".into(),
    })
}
