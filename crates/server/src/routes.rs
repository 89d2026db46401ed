//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Client-facing update protocol
    let update_routes = Router::new()
        .route("/update/{platform}/{version}", get(handlers::check_update))
        .route("/latest.yml", get(handlers::latest_yml))
        .route(
            "/download/{platform}/{filename}",
            get(handlers::download_file),
        );

    // Uploads carry whole installers; the body limit comes from configuration
    let upload_routes = Router::new()
        .route("/upload/{platform}", post(handlers::upload_release))
        .route("/api/upload/{platform}", post(handlers::upload_release))
        .layer(DefaultBodyLimit::max(
            state.config.server.max_upload_bytes(),
        ));

    let api_routes = Router::new()
        // Release table
        .route(
            "/versions",
            get(handlers::list_versions).post(handlers::set_version),
        )
        .route(
            "/api/versions",
            get(handlers::list_versions).post(handlers::set_version),
        )
        .route("/api/download/{platform}", get(handlers::download_latest))
        .route(
            "/api/files/{platform}/{filename}",
            delete(handlers::delete_file),
        )
        .route("/api/rollback", post(handlers::rollback))
        // Logs
        .route(
            "/api/logs",
            get(handlers::get_logs).delete(handlers::clear_logs),
        )
        .route("/api/activity", get(handlers::list_activity))
        .route("/api/download-logs", get(handlers::list_download_logs))
        .route("/api/version-history", get(handlers::list_version_history))
        .route(
            "/api/version-history/{id}",
            delete(handlers::delete_version_history),
        )
        // Settings
        .route(
            "/api/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        // Service
        .route("/health", get(handlers::health_check))
        .route("/", get(handlers::service_index));

    let mut router = Router::new()
        .merge(update_routes)
        .merge(upload_routes)
        .merge(api_routes);

    // Conditionally add metrics endpoint
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
