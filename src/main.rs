use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

mod access;
mod api;
mod commands;
mod config;
mod engine;
mod models;
mod notify;
mod probe;
mod registry;
mod report;
mod state;
mod telegram;

use crate::access::AccessMap;
use crate::config::MonitorConfig;
use crate::notify::{LogNotifier, Notifier};
use crate::probe::ProbeFactory;
use crate::registry::Registry;
use crate::telegram::{TelegramClient, TelegramNotifier};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = std::env::var("PULSEWATCH_CONFIG").unwrap_or_else(|_| "config.json".into());
    let config = MonitorConfig::load(&config_path)
        .with_context(|| format!("Invalid configuration ({})", config_path))?;

    let mut probes = ProbeFactory::new();
    let registry = Arc::new(Registry::from_config(&config, &mut probes)?);
    let access = Arc::new(AccessMap::from_targets(&config.targets));
    info!(
        targets = registry.len(),
        interval_secs = config.check_interval,
        confirmation_secs = config.confirmation_secs,
        "Configuration loaded"
    );

    let telegram = config.telegram.bot_token.as_deref().map(TelegramClient::new);
    let notifier: Arc<dyn Notifier> = match &telegram {
        Some(client) => Arc::new(TelegramNotifier::new(client.clone(), &config.targets)),
        None => {
            warn!("BOT_TOKEN not set and no target has members, notifications go to the log only");
            Arc::new(LogNotifier)
        }
    };

    let _monitors = registry.spawn(notifier, config.interval());

    if let (Some(client), true) = (telegram, config.telegram.commands) {
        tokio::spawn(telegram::poll_commands(client, Arc::clone(&registry), Arc::clone(&access)));
    }

    let state = api::AppState { registry: Arc::clone(&registry), access };
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, state).await {
            tracing::error!("Status API failed: {:#}", e);
        }
    });

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping monitors...");

    Ok(())
}
