use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::jwt::JwtKeys;
use crate::cards::repo::CardRepo;
use crate::config::AppConfig;
use crate::db::{MemoryStore, PgStore};
use crate::users::repo::UserRepo;

/// Everything handlers need, built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub users: Arc<dyn UserRepo>,
    pub cards: Arc<dyn CardRepo>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        if config.database_url.starts_with("memory://") {
            warn!("using in-memory store; data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            return Ok(Self::from_parts(config, store.clone(), store));
        }

        let store = PgStore::connect(&config.database_url).await?;
        store.migrate().await?;
        info!("connected to postgres");
        let store = Arc::new(store);
        Ok(Self::from_parts(config, store.clone(), store))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepo>,
        cards: Arc<dyn CardRepo>,
    ) -> Self {
        Self {
            keys: JwtKeys::new(&config.jwt),
            config,
            users,
            cards,
        }
    }

    /// Test state: in-memory store and a test-only secret.
    #[cfg(test)]
    pub fn fake() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::from_parts(Arc::new(test_config()), store.clone(), store)
    }
}

#[cfg(test)]
pub const TEST_JWT_SECRET: &str = "test-secret";

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        environment: crate::config::Environment::Test,
        database_url: "memory://".into(),
        jwt: crate::config::JwtConfig {
            secret: TEST_JWT_SECRET.into(),
            ttl_days: 7,
        },
        cors_origins: vec!["http://localhost:3000".into()],
    }
}
