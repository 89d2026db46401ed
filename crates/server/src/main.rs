//! Perch server binary.

use anyhow::{Context, Result};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use perch_server::config::load_config;
use perch_server::{AppState, create_router};
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Perch - a self-hosted update server for desktop applications
#[derive(Parser, Debug)]
#[command(name = "perchd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PERCH_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration decides the default log level, so it is loaded first
    let loaded = load_config(Path::new(&args.config)).await?;
    let mut config = loaded.config;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Perch v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loaded configuration from file");
    } else {
        tracing::info!(config_path = %args.config, "No config file found, using defaults and environment");
    }
    for key in &loaded.ignored_settings {
        tracing::warn!(key = %key, "Ignoring unknown key in settings file");
    }

    if config.server.metrics_enabled {
        perch_server::metrics::register_metrics();
        tracing::info!("Prometheus metrics registered");
    }

    // Initialize storage backend
    let storage = perch_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    storage
        .health_check()
        .await
        .context("storage health check failed")?;
    let discarded = perch_storage::prepare(storage.as_ref())
        .await
        .context("failed to prepare storage")?;
    tracing::info!(
        backend = storage.backend_name(),
        discarded_staged = discarded,
        "Storage backend ready"
    );

    // Initialize metadata store (creates the release table on first run)
    let metadata = perch_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!(data_dir = %config.metadata.data_dir.display(), "Metadata store initialized");

    let addr: SocketAddr = config
        .server
        .bind_addr()
        .parse()
        .context("invalid bind address")?;

    let tls = load_tls(&config.server.tls).await;
    if tls.is_none() {
        config.server.tls.enabled = false;
    }

    let state = AppState::new(config, storage, metadata);
    // ConnectInfo provides client IPs for the download log
    let service = create_router(state).into_make_service_with_connect_info::<SocketAddr>();

    match tls {
        Some(tls) => {
            tracing::info!("Listening on https://{}", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(service)
                .await
                .with_context(|| format!("HTTPS server on {} failed", addr))?;
        }
        None => {
            tracing::info!("Listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind to {}", addr))?;
            axum::serve(listener, service).await?;
        }
    }

    Ok(())
}

/// Load the HTTPS certificate, or `None` to serve plain HTTP.
///
/// A certificate that cannot be loaded is logged and HTTP is served instead.
async fn load_tls(tls: &perch_core::config::TlsConfig) -> Option<RustlsConfig> {
    let Some((cert, key)) = tls.pem_paths() else {
        if tls.enabled {
            tracing::warn!("TLS is enabled but cert_path or key_path is unset, serving HTTP");
        }
        return None;
    };
    match RustlsConfig::from_pem_file(cert, key).await {
        Ok(config) => {
            tracing::info!(cert = %cert.display(), "TLS certificate loaded");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(
                cert = %cert.display(),
                key = %key.display(),
                error = %e,
                "Failed to load TLS certificate, falling back to HTTP"
            );
            None
        }
    }
}
