use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use super::{validate_id, Schema};
use crate::{db::ObjectId, error::AppError};

/// Request bodies that are checked against a schema before deserialization.
pub trait Validated {
    fn schema() -> &'static Schema;
}

/// JSON body that passed its route schema.
#[derive(Debug)]
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validated,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| {
                warn!(error = %rejection, "unreadable json body");
                AppError::BadRequest("Invalid JSON body".into())
            })?;

        T::schema().validate(&body).map_err(|e| {
            warn!(error = %e, "body rejected by schema");
            AppError::from(e)
        })?;

        let value = serde_json::from_value(body).map_err(|e| {
            warn!(error = %e, "body does not fit request type");
            AppError::BadRequest("Invalid request body".into())
        })?;
        Ok(ValidJson(value))
    }
}

/// Single `:id`-style path parameter holding a store identifier.
#[derive(Debug, Clone)]
pub struct ValidId(pub ObjectId);

#[async_trait]
impl<S> FromRequestParts<S> for ValidId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(params) = Path::<Vec<(String, String)>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| {
                warn!(error = %rejection, "unreadable path params");
                AppError::BadRequest("Invalid path parameters".into())
            })?;

        let (name, raw) = params
            .into_iter()
            .next()
            .ok_or_else(|| AppError::BadRequest("Missing path parameter".into()))?;

        let id = validate_id(&name, &raw).map_err(|e| {
            warn!(param = %name, error = %e, "malformed id");
            AppError::from(e)
        })?;
        Ok(ValidId(id))
    }
}
