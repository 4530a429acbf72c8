use anyhow::Context;
use hyperlens::{api, config::Config};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let addr = SocketAddr::new(config.bind_addr, config.port);

    tracing::info!(
        pnl_mode = ?config.metrics.pnl_mode,
        risk_free_rate = config.metrics.risk_free_rate,
        drawdown_threshold = config.metrics.drawdown_threshold,
        max_batch_size = config.max_batch_size,
        "Loaded configuration"
    );

    let app = api::create_router(api::AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
