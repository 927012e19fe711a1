//! Ticketing service server.
//!
//! # Usage
//!
//! ```bash
//! # Start PostgreSQL, then
//! cargo run --bin server
//! ```
//!
//! Configuration comes from the environment (and `.env` when present).

use ticketing_server::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    ticketing_server::init_tracing();
    tracing::info!("🎫 Starting ticketing service...");

    ticketing_server::run(Config::from_env()).await
}
