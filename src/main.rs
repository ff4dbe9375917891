use log::{error, info};
use std::sync::Arc;

use lifedash::auth::build_provider;
use lifedash::core::config::AppConfig;
use lifedash::core::shared::state::AppState;
use lifedash::core::shared::utils::{create_conn, run_migrations};
use lifedash::main_module::run_axum_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=debug")),
        )
        .init();

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration: {:?}", config.auth);

    let conn = create_conn(&config.database).map_err(|e| {
        error!("Failed to create database pool: {}", e);
        e
    })?;

    if config.database.run_migrations {
        run_migrations(&conn)?;
    }

    let identity = build_provider(&config.auth)?;
    let app_state = Arc::new(AppState::new(conn, identity, config));

    run_axum_server(app_state).await?;
    info!("Server stopped");
    Ok(())
}
