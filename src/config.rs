use anyhow::{Context, Result, anyhow};
use std::time::Duration;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 25;
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Upper bound for a single storage call (one upsert, one search, one lookup)
    pub query_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Build a config from an arbitrary variable source.
    ///
    /// `DATABASE_URL` wins when present; otherwise the URL is assembled from
    /// `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_DB`, `DB_HOST`, `DB_PORT`
    /// and `DB_SSLMODE`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let user = lookup("POSTGRES_USER")
                    .ok_or_else(|| anyhow!("DATABASE_URL or POSTGRES_USER must be set"))?;
                let password = lookup("POSTGRES_PASSWORD")
                    .ok_or_else(|| anyhow!("POSTGRES_PASSWORD environment variable is required"))?;
                let db_name = lookup("POSTGRES_DB")
                    .ok_or_else(|| anyhow!("POSTGRES_DB environment variable is required"))?;
                let host = lookup("DB_HOST").unwrap_or_else(|| "localhost".to_string());
                let port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
                let ssl_mode = lookup("DB_SSLMODE").unwrap_or_else(|| "disable".to_string());

                format!(
                    "postgres://{}:{}@{}:{}/{}?sslmode={}",
                    user, password, host, port, db_name, ssl_mode
                )
            }
        };

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .with_context(|| format!("Invalid DB_MAX_CONNECTIONS: '{}'", v))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let query_timeout = match lookup("QUERY_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse::<u64>()
                    .with_context(|| format!("Invalid QUERY_TIMEOUT_SECS: '{}'", v))?,
            ),
            None => DEFAULT_QUERY_TIMEOUT,
        };

        Ok(Self {
            database_url,
            max_connections,
            query_timeout,
        })
    }

    /// Database URL with any password replaced, for logging
    pub fn redacted_database_url(&self) -> String {
        let Some((scheme, rest)) = self.database_url.split_once("://") else {
            return self.database_url.clone();
        };
        let Some((credentials, host)) = rest.rsplit_once('@') else {
            return self.database_url.clone();
        };
        match credentials.split_once(':') {
            Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
            None => self.database_url.clone(),
        }
    }
}
