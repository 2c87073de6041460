use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cqutimetable::config::AppConfig;
use cqutimetable::server::create_router;
use cqutimetable::types::AppState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "CQUTIMETABLE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cqutimetable=info,tower_http=info")),
        )
        .init();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = if config_path.exists() {
        info!("Loading config from {}", config_path.display());
        AppConfig::load_from_file(&config_path)
            .with_context(|| format!("failed to load {}", config_path.display()))?
    } else {
        warn!(
            "Config file {} not found, using defaults",
            config_path.display()
        );
        AppConfig::default()
    };

    let settings = config
        .timetable
        .to_settings()
        .context("invalid timetable settings")?;
    info!(
        periods = settings.clock.len(),
        timezone = %settings.zone.tzid,
        "Loaded period table"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.address, config.server.port)
        .parse()
        .context("invalid server address")?;
    let state = Arc::new(AppState::new(config.server, settings));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
