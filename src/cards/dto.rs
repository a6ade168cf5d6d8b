use serde::Deserialize;

use crate::validation::{schemas, Schema, Validated};

/// Request body for `POST /cards`.
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub name: String,
    pub link: String,
}

impl Validated for CreateCardRequest {
    fn schema() -> &'static Schema {
        &schemas::CARD_CREATE
    }
}
