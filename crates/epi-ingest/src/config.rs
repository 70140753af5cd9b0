//! Run configuration
//!
//! Loaded once from the environment (after an optional `.env` file) and
//! passed into the pipeline; nothing reads the environment after startup.

use crate::error::ConfigError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Defaults
// ============================================================================

/// Default PostgreSQL port.
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Default maximum database connections in the pool.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DB_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;

/// Default number of simultaneous source downloads.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 5;

/// Default redirect hop limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Default rows per INSERT statement.
pub const DEFAULT_PUBLISH_CHUNK_SIZE: usize = 1000;

/// PostgreSQL bind parameter limit per statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Widest published row, in columns.
pub const MAX_ROW_COLUMNS: usize = 10;

/// Complete configuration of one run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database: DatabaseConfig,
    pub fetch: FetchConfig,
    pub publish: PublishConfig,
}

/// Connection target for the published tables
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// `true` requires TLS, otherwise it is used when the server offers it
    pub require_tls: bool,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("require_tls", &self.require_tls)
            .field("max_connections", &self.max_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// HTTP settings for the fetcher
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
        }
    }
}

/// Snapshot publisher settings
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub chunk_size: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_PUBLISH_CHUNK_SIZE,
        }
    }
}

impl IngestConfig {
    /// Load from the process environment
    ///
    /// Environment variables:
    /// - `DB_HOST`, `DB_USERNAME`, `DB_DATABASE`: required
    /// - `DB_PASSWORD`: optional, empty by default
    /// - `DB_PORT`, `DB_MAX_CONNECTIONS`, `DB_CONNECT_TIMEOUT`
    /// - `DB_SSL`: `true` to require TLS
    /// - `FETCH_TIMEOUT`, `FETCH_CONCURRENCY`, `FETCH_MAX_REDIRECTS`
    /// - `PUBLISH_CHUNK_SIZE`
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let config = IngestConfig {
            database: DatabaseConfig {
                host: env.required("DB_HOST")?,
                port: env.parsed("DB_PORT", DEFAULT_DB_PORT)?,
                username: env.required("DB_USERNAME")?,
                password: env.get("DB_PASSWORD").unwrap_or_default(),
                database: env.required("DB_DATABASE")?,
                require_tls: env.flag("DB_SSL")?,
                max_connections: env.parsed("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
                connect_timeout_secs: env
                    .parsed("DB_CONNECT_TIMEOUT", DEFAULT_DB_CONNECT_TIMEOUT_SECS)?,
            },
            fetch: FetchConfig {
                timeout_secs: env.parsed("FETCH_TIMEOUT", DEFAULT_FETCH_TIMEOUT_SECS)?,
                concurrency: env.parsed("FETCH_CONCURRENCY", DEFAULT_FETCH_CONCURRENCY)?,
                max_redirects: env.parsed("FETCH_MAX_REDIRECTS", DEFAULT_MAX_REDIRECTS)?,
            },
            publish: PublishConfig {
                chunk_size: env.parsed("PUBLISH_CHUNK_SIZE", DEFAULT_PUBLISH_CHUNK_SIZE)?,
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::Validation(msg));

        if self.database.host.trim().is_empty() {
            return fail("DB_HOST cannot be empty".into());
        }
        if self.database.database.trim().is_empty() {
            return fail("DB_DATABASE cannot be empty".into());
        }
        if self.database.max_connections == 0 {
            return fail("DB_MAX_CONNECTIONS must be greater than 0".into());
        }
        if self.database.connect_timeout_secs == 0 {
            return fail("DB_CONNECT_TIMEOUT must be greater than 0".into());
        }
        if self.fetch.timeout_secs == 0 {
            return fail("FETCH_TIMEOUT must be greater than 0".into());
        }
        if self.fetch.concurrency == 0 {
            return fail("FETCH_CONCURRENCY must be greater than 0".into());
        }
        if self.publish.chunk_size == 0 {
            return fail("PUBLISH_CHUNK_SIZE must be greater than 0".into());
        }
        if self.publish.chunk_size * MAX_ROW_COLUMNS > MAX_BIND_PARAMETERS {
            return fail(format!(
                "PUBLISH_CHUNK_SIZE {} exceeds the bind parameter limit (max {})",
                self.publish.chunk_size,
                MAX_BIND_PARAMETERS / MAX_ROW_COLUMNS
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database)
            .ssl_mode(if self.require_tls {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            })
    }

    /// Build a pool; connections are opened on first use
    pub fn pool(&self) -> PgPool {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect_lazy_with(self.connect_options())
    }
}

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.get(key).ok_or(ConfigError::Missing(key))
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn flag(&self, key: &'static str) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.to_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::Invalid {
                    key,
                    value: v,
                    reason: "expected a boolean".into(),
                }),
            },
        }
    }
}
