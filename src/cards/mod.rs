use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;

/// Protected card routes; mount behind the auth gate.
pub fn router() -> Router<AppState> {
    handlers::card_routes()
}
