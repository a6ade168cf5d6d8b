use serde::{Deserialize, Serialize};

use crate::validation::{schemas, Schema, Validated};

/// Request body for `POST /signup`.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub about: Option<String>,
    pub avatar: Option<String>,
}

impl Validated for SignUpRequest {
    fn schema() -> &'static Schema {
        &schemas::SIGN_UP
    }
}

/// Request body for `POST /signin`.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

impl Validated for SignInRequest {
    fn schema() -> &'static Schema {
        &schemas::SIGN_IN
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ExitResponse {
    pub exit: String,
}
