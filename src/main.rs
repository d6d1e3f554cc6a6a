//! VoIP Dispatch - call-center telephony coordinator.
//!
//! Routes inbound PSTN calls to pools of available agents, reconciles the
//! provider's webhook callbacks into a durable call ledger, and coordinates
//! park/transfer handoffs between agents.

mod models;
mod server;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("voip_dispatch=info".parse()?),
        )
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = server::config::AppConfig::from_env()?;
    tracing::info!("Starting VoIP Dispatch server on port {}", config.port);

    server::run_server(config).await
}
