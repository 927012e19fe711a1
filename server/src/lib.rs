//! Ticketing service process: configuration, telemetry and server lifecycle.
//!
//! [`run`] wires everything together:
//!
//! 1. Install the Prometheus exporter and register metric descriptions
//! 2. Open the `PostgreSQL` pool and run migrations
//! 3. Serve the HTTP router until Ctrl+C or SIGTERM
//! 4. Drain in-flight requests (bounded by `SHUTDOWN_TIMEOUT`) and close the pool

#![forbid(unsafe_code)]

pub mod config;

pub use config::{Config, PostgresConfig, ServerConfig};

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use ticketing_core::TicketService;
use ticketing_postgres::PgTicketRepository;
use ticketing_web::AppState;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,ticketing=debug,sqlx=warn";

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`; falls back to [`DEFAULT_LOG_FILTER`].
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install the Prometheus recorder and its scrape endpoint.
///
/// # Errors
///
/// Returns an error if the address is invalid or the listener cannot start.
pub fn install_metrics(config: &ServerConfig) -> anyhow::Result<()> {
    let address = config
        .metrics_address()
        .context("Invalid metrics address")?;

    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .context("Failed to install Prometheus exporter")?;

    ticketing_core::telemetry::describe_metrics();
    tracing::info!(%address, "Metrics exporter listening");
    Ok(())
}

/// Run the service until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an error if the database is unreachable, migrations fail, the
/// listener cannot bind, or the server stops abnormally.
pub async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        postgres_host = %config.postgres.host,
        postgres_port = config.postgres.port,
        postgres_db = %config.postgres.database,
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );

    install_metrics(&config.server)?;

    let pool = ticketing_postgres::connect(&config.postgres.pool_settings())
        .await
        .context("Failed to connect to PostgreSQL")?;
    let repository = PgTicketRepository::new(pool.clone());
    repository
        .migrate()
        .await
        .context("Failed to run migrations")?;
    tracing::info!("✓ Database ready");

    if config.server.purchase_timeout() >= config.server.request_timeout() {
        tracing::warn!(
            purchase_timeout_secs = config.server.purchase_timeout,
            request_timeout_secs = config.server.request_timeout,
            "Purchase deadline is not shorter than the request deadline"
        );
    }
    let service =
        TicketService::new(repository).with_purchase_timeout(config.server.purchase_timeout());
    let app = ticketing_web::router(AppState::from_service(service), config.server.request_timeout());
    let listener = tokio::net::TcpListener::bind(config.server.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address()))?;
    tracing::info!(address = %config.server.bind_address(), "HTTP server listening");

    let stop = Arc::new(Notify::new());
    let serve = axum::serve(listener, app).with_graceful_shutdown({
        let stop = Arc::clone(&stop);
        async move { stop.notified().await }
    });
    let mut server = tokio::spawn(async move { serve.await });

    tokio::select! {
        result = &mut server => {
            result.context("HTTP server task panicked")??;
        }
        () = shutdown_signal() => {
            tracing::info!("Shutting down gracefully...");
            stop.notify_one();

            let grace = config.server.shutdown_timeout();
            match tokio::time::timeout(grace, &mut server).await {
                Ok(result) => result.context("HTTP server task panicked")??,
                Err(_) => {
                    tracing::warn!(timeout_secs = grace.as_secs(), "Shutdown timed out, aborting in-flight requests");
                    server.abort();
                }
            }
        }
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// A signal handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        }
    }
}
