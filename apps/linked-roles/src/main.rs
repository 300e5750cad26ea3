use axum_helpers::{create_production_app, with_request_tracing};
use core_config::tracing::{init_tracing, install_color_eyre};
use migration::Migrator;
use std::time::Duration;
use tracing::info;

mod config;
mod state;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible operations)
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    if config.run_migrations {
        database::postgres::run_migrations::<Migrator>(&db, env!("CARGO_PKG_NAME")).await?;
    }

    let state = state::build_state(&config, db.clone())?;
    let app = with_request_tracing(domain_linked_roles::router(state));

    info!("Starting linked roles service (30s shutdown timeout)");

    create_production_app(app, &config.server, Duration::from_secs(30), async move {
        info!("Shutting down: closing database connection");
        match db.close().await {
            Ok(_) => info!("PostgreSQL connection closed successfully"),
            Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
        }
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("Linked roles service shutdown complete");
    Ok(())
}
