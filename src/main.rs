use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use hazardgate::server::{self, AppState};
use hazardgate::{safe_zones, Aggregator, GatewayConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GatewayConfig::from_env();
    let port = config.port;
    let zones = safe_zones::load(Path::new(safe_zones::DEFAULT_PATH));
    let aggregator = Arc::new(Aggregator::new(config)?);
    let state = Arc::new(AppState { aggregator, safe_zones: Arc::new(zones) });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "hazardgate listening");
    axum::serve(listener, server::router(state)).await?;
    Ok(())
}
