use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::{info, warn};

const DEV_SECRET: &str = "dev-secret-change-me";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl Config {
    /// Read `THOUGHTS_*` variables, falling back to development defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("THOUGHTS_JWT_SECRET").unwrap_or_else(|| {
            warn!("THOUGHTS_JWT_SECRET not set, using the development secret");
            DEV_SECRET.into()
        });

        let token_ttl_hours: i64 = parse_or(&lookup, "THOUGHTS_TOKEN_TTL_HOURS", 2)?;
        if token_ttl_hours <= 0 {
            anyhow::bail!("THOUGHTS_TOKEN_TTL_HOURS must be positive, got {}", token_ttl_hours);
        }

        Ok(Self {
            host: lookup("THOUGHTS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "THOUGHTS_PORT", 3001)?,
            db_path: lookup("THOUGHTS_DB_PATH")
                .unwrap_or_else(|| "thoughts.db".into())
                .into(),
            jwt_secret,
            token_ttl_hours,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {key} value: {raw:?}")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
