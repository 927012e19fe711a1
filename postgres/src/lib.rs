//! `PostgreSQL` storage for the ticketing service.
//!
//! This crate implements the `TicketRepository` and `Database` traits from
//! `ticketing-core` on top of sqlx:
//!
//! - Connection pooling ([`connect`], [`PoolSettings`])
//! - Embedded migrations ([`PgTicketRepository::migrate`])
//! - Row locking with `SELECT ... FOR UPDATE`
//! - Soft deletes (`deleted_at IS NULL` on every read)
//!
//! # Example
//!
//! ```ignore
//! use ticketing_postgres::{connect, PgTicketRepository, PoolSettings};
//!
//! async fn example(settings: PoolSettings) -> Result<(), ticketing_core::TicketError> {
//!     let pool = connect(&settings).await?;
//!     let repository = PgTicketRepository::new(pool);
//!     repository.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod repository;

pub use repository::{PgDatabase, PgTicketRepository, PgTransaction};

use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::time::Duration;
use ticketing_core::{Result, TicketError};

/// Pool sizing and connection target.
#[derive(Clone, Debug)]
pub struct PoolSettings {
    /// Where and how to connect.
    pub connect_options: PgConnectOptions,
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// Connections kept open while idle.
    pub min_connections: u32,
    /// How long to wait for a connection before failing.
    pub acquire_timeout: Duration,
}

/// Open a connection pool.
///
/// # Errors
///
/// Returns [`TicketError::PersistenceFailure`] if the first connection cannot
/// be established.
pub async fn connect(settings: &PoolSettings) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(settings.acquire_timeout)
        .connect_with(settings.connect_options.clone())
        .await
        .map_err(|e| TicketError::persistence(format!("Failed to connect: {e}")))?;

    tracing::info!(
        max_connections = settings.max_connections,
        min_connections = settings.min_connections,
        "PostgreSQL pool ready"
    );

    Ok(pool)
}
