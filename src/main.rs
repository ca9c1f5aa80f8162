use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webshop::config::Config;
use webshop::AppState;

#[derive(Parser, Debug)]
#[command(name = "webshop")]
#[command(author, version, about = "A small e-commerce REST backend", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "webshop.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting webshop v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    std::fs::create_dir_all(&config.server.data_dir)?;

    // Initialize database. A connection or migration failure here is fatal;
    // it never surfaces as an HTTP response.
    let db = webshop::db::init(&config.server.data_dir).await?;

    // Ensure the seed admin account exists
    webshop::api::auth::ensure_admin_user(&db, &config.auth).await?;

    let public_dir = config.server.public_dir.clone();
    let addr = format!("{}:{}", config.server.host, config.server.port);

    // Create app state and API router
    let state = Arc::new(AppState::new(config, db));
    let api_router = webshop::api::create_router(state);

    // Static front-end for non-API GETs; anything else unmatched is a 404,
    // independent of method.
    let serve_static = ServeDir::new(&public_dir).call_fallback_on_method_not_allowed(true);

    let app = axum::Router::new()
        .merge(api_router)
        .fallback_service(serve_static);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
