use serde::Deserialize;

use crate::validation::{schemas, Schema, Validated};

/// Request body for `PATCH /users/me`.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub about: String,
}

impl Validated for UpdateProfileRequest {
    fn schema() -> &'static Schema {
        &schemas::PROFILE_UPDATE
    }
}

/// Request body for `PATCH /users/me/avatar`.
#[derive(Debug, Deserialize)]
pub struct UpdateAvatarRequest {
    pub avatar: String,
}

impl Validated for UpdateAvatarRequest {
    fn schema() -> &'static Schema {
        &schemas::AVATAR_UPDATE
    }
}
