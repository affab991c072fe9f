//! Subscription engine HTTP server.

use tracing::info;
use tracing_subscriber::EnvFilter;

use subscription_engine::bootstrap::{build_app, build_state};
use subscription_engine::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server.log_level, config.server.json_logs);

    let addr = config.server.socket_addr()?;
    let state = build_state(&config).await?;
    let app = build_app(state, &config.server);

    info!(%addr, environment = ?config.server.environment, "Subscription engine listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shut down cleanly");
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
