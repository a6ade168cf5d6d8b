use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

pub mod memory;
pub mod object_id;

pub use memory::MemoryStore;
pub use object_id::ObjectId;

use crate::validation::patterns;

/// Failure kinds the store reports. Classified where the failure happens so
/// callers never inspect driver errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key")]
    Duplicate,
    #[error("record validation failed: {0}")]
    Invalid(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            if db.is_unique_violation() {
                return StoreError::Duplicate;
            }
            if db.is_check_violation() || db.is_foreign_key_violation() {
                return StoreError::Invalid(db.message().to_string());
            }
        }
        StoreError::Backend(anyhow::Error::new(e))
    }
}

// Record-level validators, run by every store on create and update.

pub(crate) fn check_text(field: &str, value: &str, min: usize, max: usize) -> Result<(), StoreError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(StoreError::Invalid(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub(crate) fn check_link(field: &str, value: &str) -> Result<(), StoreError> {
    if !patterns::is_valid_link(value) {
        return Err(StoreError::Invalid(format!("{field} must be a valid URL")));
    }
    Ok(())
}

pub(crate) fn check_email(value: &str) -> Result<(), StoreError> {
    if !patterns::is_valid_email(value) {
        return Err(StoreError::Invalid("email must be a valid email".into()));
    }
    Ok(())
}

/// Postgres-backed document store.
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        info!("migrations applied");
        Ok(())
    }
}
