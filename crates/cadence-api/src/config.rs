// API server configuration
//
// Loaded from environment variables (a `.env` file is read first by main).
// Parsing goes through a lookup closure so it can be tested without touching
// the process environment.

use std::net::SocketAddr;

use anyhow::{bail, Context, Result};

/// Default bind address for the HTTP server
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:9000";

/// Default cap on the number of windows a single series may expand to
pub const DEFAULT_MAX_SERIES_OCCURRENCES: usize = 1000;

/// Default size of the PostgreSQL connection pool
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// PostgreSQL URL; `None` selects the in-memory store (dev mode)
    pub database_url: Option<String>,
    pub http_addr: SocketAddr,
    /// Prefix nesting every `/v1` route, e.g. `/api`
    pub api_prefix: String,
    pub cors_allowed_origins: Vec<String>,
    pub max_series_occurrences: usize,
    pub db_max_connections: u32,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let http_addr = get("HTTP_ADDR")
            .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string())
            .parse()
            .context("HTTP_ADDR must be a socket address like 0.0.0.0:9000")?;

        let max_series_occurrences = match get("MAX_SERIES_OCCURRENCES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .context("MAX_SERIES_OCCURRENCES must be a positive integer")?,
            None => DEFAULT_MAX_SERIES_OCCURRENCES,
        };
        if max_series_occurrences == 0 {
            bail!("MAX_SERIES_OCCURRENCES must be a positive integer");
        }

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a positive integer")?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        // Example: CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: get("DATABASE_URL"),
            http_addr,
            api_prefix: get("API_PREFIX").unwrap_or_default(),
            cors_allowed_origins,
            max_series_occurrences,
            db_max_connections,
        })
    }
}
