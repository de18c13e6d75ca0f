//! Referral Node - HTTP API and background contacts sync

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use referral_node::config::{Cli, Config};
use referral_node::{build_state, server, updater};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "referral_node=info,referral_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    config.apply_cli(&cli);
    let config = Arc::new(config);

    info!("Starting referral-node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Port: {}", config.server.port);
    info!("  Data dir: {}", config.storage.data_dir.display());
    info!("  Teams per group: {}", config.registry.teams_per_group);
    info!("  Solo references: {}", config.registry.solo_count);
    info!("  Update interval: {}s", config.update_interval().as_secs());

    let state = build_state(&config)?;
    info!("  Store backend: {}", state.service.store().backend());

    let _updater = updater::spawn_updater(state.service.clone(), config.update_interval());

    server::run(state, config.server.port).await
}
