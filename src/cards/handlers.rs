use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::CreateCardRequest,
    repo_types::{Card, NewCard},
};
use crate::{
    auth::AuthUser,
    db::StoreError,
    error::{not_found, AppError},
    state::AppState,
    validation::{ValidId, ValidJson},
};

const CARD_NOT_FOUND: &str = "Card not found";

pub fn card_routes() -> Router<AppState> {
    Router::new()
        .route("/cards", get(get_cards).post(create_card).fallback(not_found))
        .route("/cards/:cardId", delete(delete_card).fallback(not_found))
        .route(
            "/cards/:cardId/likes",
            put(like_card).delete(dislike_card).fallback(not_found),
        )
}

#[instrument(skip(state))]
pub async fn get_cards(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<Vec<Card>>, AppError> {
    Ok(Json(state.cards.find_all().await?))
}

#[instrument(skip(state, payload))]
pub async fn create_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<CreateCardRequest>,
) -> Result<(StatusCode, Json<Card>), AppError> {
    let new_card = NewCard {
        name: payload.name,
        link: payload.link,
        owner: user_id,
    };
    let card = match state.cards.create(new_card).await {
        Ok(card) => card,
        Err(StoreError::Invalid(reason)) => {
            warn!(%reason, "card record rejected");
            return Err(AppError::BadRequest("Invalid card data".into()));
        }
        Err(e) => return Err(e.into()),
    };
    info!(card_id = %card.id, owner = %card.owner, "card created");
    Ok((StatusCode::CREATED, Json(card)))
}

#[instrument(skip(state))]
pub async fn delete_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidId(card_id): ValidId,
) -> Result<Json<Card>, AppError> {
    let card = state
        .cards
        .find_by_id(&card_id)
        .await?
        .ok_or_else(|| AppError::NotFound(CARD_NOT_FOUND.into()))?;

    if card.owner != user_id {
        warn!(%card_id, %user_id, owner = %card.owner, "delete of foreign card refused");
        return Err(AppError::Forbidden(
            "You cannot delete another user's card".into(),
        ));
    }

    // A concurrent delete between the check and here surfaces as not found.
    let deleted = state
        .cards
        .delete(&card_id)
        .await?
        .ok_or_else(|| AppError::NotFound(CARD_NOT_FOUND.into()))?;
    info!(%card_id, "card deleted");
    Ok(Json(deleted))
}

#[instrument(skip(state))]
pub async fn like_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidId(card_id): ValidId,
) -> Result<Json<Card>, AppError> {
    let card = state
        .cards
        .add_like(&card_id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(CARD_NOT_FOUND.into()))?;
    Ok(Json(card))
}

#[instrument(skip(state))]
pub async fn dislike_card(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidId(card_id): ValidId,
) -> Result<Json<Card>, AppError> {
    let card = state
        .cards
        .remove_like(&card_id, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(CARD_NOT_FOUND.into()))?;
    Ok(Json(card))
}
