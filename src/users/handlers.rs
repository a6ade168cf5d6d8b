use axum::{
    extract::State,
    routing::{get, patch},
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{UpdateAvatarRequest, UpdateProfileRequest},
    repo_types::{User, UserPatch},
};
use crate::{
    auth::AuthUser,
    db::{ObjectId, StoreError},
    error::{not_found, AppError},
    state::AppState,
    validation::{ValidId, ValidJson},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(get_users).fallback(not_found))
        .route(
            "/users/me",
            get(get_current_user).patch(update_profile).fallback(not_found),
        )
        .route("/users/me/avatar", patch(update_avatar).fallback(not_found))
        .route("/users/:userId", get(get_user_by_id).fallback(not_found))
}

#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.find_all().await?))
}

#[instrument(skip(state))]
pub async fn get_current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<User>, AppError> {
    let user = state.users.find_by_id(&user_id).await?.ok_or_else(|| {
        warn!(%user_id, "authenticated user no longer exists");
        AppError::NotFound("User not found".into())
    })?;
    Ok(Json(user))
}

#[instrument(skip(state))]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ValidId(user_id): ValidId,
) -> Result<Json<User>, AppError> {
    let user = state
        .users
        .find_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Requested user not found".into()))?;
    Ok(Json(user))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let patch = UserPatch {
        name: Some(payload.name),
        about: Some(payload.about),
        avatar: None,
    };
    apply_patch(&state, &user_id, patch).await.map(Json)
}

#[instrument(skip(state, payload))]
pub async fn update_avatar(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<UpdateAvatarRequest>,
) -> Result<Json<User>, AppError> {
    let patch = UserPatch {
        avatar: Some(payload.avatar),
        ..Default::default()
    };
    apply_patch(&state, &user_id, patch).await.map(Json)
}

async fn apply_patch(
    state: &AppState,
    user_id: &ObjectId,
    patch: UserPatch,
) -> Result<User, AppError> {
    match state.users.update(user_id, patch).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(AppError::NotFound("User not found".into())),
        Err(StoreError::Invalid(reason)) => {
            warn!(%reason, "profile update rejected");
            Err(AppError::BadRequest("Invalid user data".into()))
        }
        Err(e) => Err(e.into()),
    }
}
