//! Configuration management for the ticketing service.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unset or unparsable values fall back to the default silently.

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use ticketing_postgres::PoolSettings;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `PostgreSQL` configuration
    pub postgres: PostgresConfig,
    /// Application server configuration
    pub server: ServerConfig,
}

/// `PostgreSQL` configuration
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Database host
    pub host: String,
    /// Database port
    pub port: u16,
    /// Database name
    pub database: String,
    /// Login role
    pub user: String,
    /// Login password
    pub password: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// SSL mode: disable, allow, prefer, require, verify-ca, verify-full
    pub ssl_mode: String,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Per-request deadline in seconds
    pub request_timeout: u64,
    /// Deadline for a purchase's locked section in seconds
    pub purchase_timeout: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
    /// Metrics server host (for Prometheus scraping)
    pub metrics_host: String,
    /// Metrics server port
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let port = |key: &str| lookup(key).and_then(|s| s.trim().parse().ok());

        Self {
            postgres: PostgresConfig {
                host: text("POSTGRES_HOST", "localhost"),
                port: port("POSTGRES_PORT").unwrap_or(5432),
                database: text("POSTGRES_DB", "tickets"),
                user: text("POSTGRES_USER", "postgres"),
                password: text("POSTGRES_PASSWORD", "postgres"),
                max_connections: lookup("DATABASE_MAX_CONNECTIONS")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(10),
                min_connections: lookup("DATABASE_MIN_CONNECTIONS")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(1),
                connect_timeout: parsed_u64(&lookup, "DATABASE_CONNECT_TIMEOUT", 30),
                ssl_mode: text("DATABASE_SSL_MODE", "disable"),
            },
            server: ServerConfig {
                host: text("HOST", "0.0.0.0"),
                port: port("PORT").unwrap_or(8080),
                request_timeout: parsed_u64(&lookup, "REQUEST_TIMEOUT", 30),
                purchase_timeout: parsed_u64(&lookup, "PURCHASE_TIMEOUT", 10),
                shutdown_timeout: parsed_u64(&lookup, "SHUTDOWN_TIMEOUT", 30),
                metrics_host: text("METRICS_HOST", "0.0.0.0"),
                metrics_port: port("METRICS_PORT").unwrap_or(9090),
            },
        }
    }
}

fn parsed_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl PostgresConfig {
    /// Connection options built from the individual parts.
    ///
    /// An unknown `ssl_mode` falls back to `disable`.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let ssl_mode = self.ssl_mode.parse().unwrap_or_else(|_| {
            tracing::warn!(ssl_mode = %self.ssl_mode, "Unknown SSL mode, using disable");
            PgSslMode::Disable
        });

        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
            .ssl_mode(ssl_mode)
    }

    /// Pool settings for [`ticketing_postgres::connect`].
    #[must_use]
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            connect_options: self.connect_options(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout: Duration::from_secs(self.connect_timeout),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout", &self.connect_timeout)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl ServerConfig {
    /// Address the HTTP server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the Prometheus scrape endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `metrics_host` is not an IP address.
    pub fn metrics_address(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.metrics_host, self.metrics_port).parse()
    }

    /// Per-request deadline.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Deadline after which a purchase is rolled back and reported as failed.
    #[must_use]
    pub const fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout)
    }

    /// Time allowed for in-flight requests after a shutdown signal.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}
