//! VikingsFarm - service entry point

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vikings_farm::{api, FarmConfig, FarmState, RandomIds};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = FarmConfig::from_env()?;
    let addr = config.bind_addr.clone();

    let state = Arc::new(FarmState::new(config, Arc::new(RandomIds)));
    info!(
        "⚔️ Loaded {} wallets, {} open positions",
        state.wallets().len(),
        state.positions()?.len()
    );

    let app = api::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 VikingsFarm starting on {}", addr);
    info!("📡 WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    state.shutdown();
    info!("VikingsFarm stopped");
    Ok(())
}
