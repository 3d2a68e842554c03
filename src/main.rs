use anyhow::Context;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;
use catask::{
    config::Config,
    routes::{build_router, AppState},
    services::{TaskService, UserStore},
    worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    let store = UserStore::from_config(&config.storage)
        .context("Failed to open user store")?;
    let tasks = TaskService::from_config(store, &config.crypto);

    if !config.crypto.enabled {
        tracing::warn!("Title encryption is disabled, new titles are stored as plaintext");
    }

    if config.maintenance.repair_interval_secs > 0 {
        let interval = Duration::from_secs(config.maintenance.repair_interval_secs);
        tokio::spawn(worker::run_repair_sweep(tasks.clone(), interval));
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = build_router(AppState::new(tasks, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on {}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;
    Ok(())
}
