use crate::state::AppState;
use axum::Router;

mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;

pub use extractors::{require_auth, AuthUser};

/// Public routes: sign-up, sign-in, logout.
pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
