//! HTTP server initialization and routing

use axum::http::HeaderValue;
use axum::{middleware::from_fn_with_state, routing::get, Router};
use log::{error, info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::middleware::authentication_middleware;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

use super::health_check;

/// Permissive when `origins` is empty, otherwise limited to the parseable entries.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if parsed.len() < origins.len() {
        warn!("Ignoring {} unparseable CORS origin(s)", origins.len() - parsed.len());
    }
    cors.allow_origin(parsed)
}

/// Every API route sits behind bearer authentication; `/health` does not.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let mut api_router: Router<Arc<AppState>> =
        Router::new().merge(crate::auth::configure_user_routes());

    #[cfg(feature = "tasks")]
    {
        api_router = api_router.merge(crate::tasks::configure_task_routes());
    }
    #[cfg(feature = "shopping")]
    {
        api_router = api_router.merge(crate::shopping::configure_shopping_routes());
    }
    #[cfg(feature = "meals")]
    {
        api_router = api_router.merge(crate::meals::configure_meals_routes());
    }
    #[cfg(feature = "budget")]
    {
        api_router = api_router.merge(crate::budget::configure_budget_routes());
    }
    #[cfg(feature = "calendar")]
    {
        api_router = api_router.merge(crate::calendar::configure_calendar_routes());
    }
    #[cfg(feature = "goals")]
    {
        api_router = api_router.merge(crate::goals::configure_goals_routes());
    }
    #[cfg(feature = "journal")]
    {
        api_router = api_router.merge(crate::journal::configure_journal_routes());
    }
    #[cfg(feature = "habits")]
    {
        api_router = api_router.merge(crate::habits::configure_habits_routes());
    }

    let cors = create_cors_layer(&app_state.config.server.cors_origins);

    api_router
        .route_layer(from_fn_with_state(app_state.clone(), authentication_middleware))
        .route(ApiUrls::HEALTH, get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}

/// Resolves on Ctrl-C, or on SIGTERM where available.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received, draining connections");
}
