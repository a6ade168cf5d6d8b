use std::{fmt, str::FromStr};

use anyhow::{bail, Context};

/// Signing secret used when running outside production. Never accepted in production.
pub const DEV_JWT_SECRET: &str = "mesto-dev-secret";

/// Upper bound for `JWT_TTL_DAYS`.
pub const MAX_TTL_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => bail!("unknown APP_ENV {other:?}"),
        }
    }
}

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_days: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_days", &self.ttl_days)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let environment = match get("APP_ENV") {
            Some(v) => v.parse()?,
            None => Environment::Development,
        };

        let secret = match (get("JWT_SECRET").filter(|s| !s.is_empty()), environment) {
            (Some(s), Environment::Production) if s == DEV_JWT_SECRET => {
                bail!("JWT_SECRET must not be the development secret in production")
            }
            (Some(s), _) => s,
            (None, Environment::Production) => bail!("JWT_SECRET is required in production"),
            (None, _) => DEV_JWT_SECRET.to_string(),
        };

        let ttl_days = match get("JWT_TTL_DAYS") {
            Some(v) => v.parse::<i64>().context("JWT_TTL_DAYS must be an integer")?,
            None => 7,
        };
        if !(1..=MAX_TTL_DAYS).contains(&ttl_days) {
            bail!("JWT_TTL_DAYS must be between 1 and {MAX_TTL_DAYS}");
        }

        let port = match get("APP_PORT") {
            Some(v) => v.parse::<u16>().context("APP_PORT must be a port number")?,
            None => 3000,
        };

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000,http://localhost:3001".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            environment,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "memory://".into()),
            jwt: JwtConfig { secret, ttl_days },
            cors_origins,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}
