//! Avaxo Agent Daemon
//!
//! Greets the control plane until it hands out settings, then listens for
//! commands forever, reconnecting whenever the bus drops.

use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avaxo_agent::{
    obtain_settings, AmqpTransport, CommandListener, ExponentialBackoff, ForwardEngine,
    TaskSpawner,
};
use avaxo_core::config::{self, AgentConfig};
use avaxo_core::Transport;
use avaxo_protocol::AgentSettings;

#[derive(Parser)]
#[command(name = "avaxo-agent")]
#[command(about = "Avaxo agent - relays TCP traffic on command from the control plane")]
#[command(version)]
struct Args {
    /// Agent name announced to the control plane (defaults to hostname)
    name: Option<String>,

    /// AMQP connection string of the control plane's broker
    #[arg(long, env = "AVAXO_BROKER_URL")]
    broker_url: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output (same as --log-level debug)
    #[arg(short, long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        "debug"
    } else {
        &args.log_level
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Avaxo agent starting...");

    let mut config = load_config(args.config.as_ref())?;
    if let Some(name) = args.name {
        config.name = Some(name);
    }
    if let Some(broker_url) = args.broker_url {
        config.broker_url = broker_url;
    }

    let name = config.agent_name();
    tracing::info!("Agent name: {}", name);

    let transport = AmqpTransport::new().with_connection_name(format!("avaxo-agent {}", name));

    tokio::select! {
        never = run(&transport, &config, &name) => match never {},
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
        }
    }

    Ok(())
}

/// Load the config file, if any.
///
/// An explicitly given file must load; the default location is optional.
fn load_config(path: Option<&PathBuf>) -> Result<AgentConfig> {
    if let Some(path) = path {
        return config::load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let default_path = config::default_config_path();
    if !default_path.exists() {
        return Ok(AgentConfig::default());
    }
    Ok(config::load_config(&default_path).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
        AgentConfig::default()
    }))
}

/// Handshake, then serve commands forever
async fn run<T: Transport>(transport: &T, config: &AgentConfig, name: &str) -> Infallible {
    let settings = Arc::new(settings_with_retry(transport, config, name).await);

    let spawner = TaskSpawner::new();
    let engine = ForwardEngine::new(config.connect_timeout, spawner.clone());
    let listener = CommandListener::new(settings, engine, spawner);

    let mut backoff = ExponentialBackoff::from_config(&config.listen_retry);
    loop {
        match listener.listen(transport, &config.broker_url).await {
            Ok(never) => match never {},
            Err(e) => tracing::error!("Error while listening for commands: {}", e),
        }
        let delay = backoff.next_delay();
        tracing::info!("Listening again in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

/// Greet the control plane until it answers with settings
async fn settings_with_retry<T: Transport>(
    transport: &T,
    config: &AgentConfig,
    name: &str,
) -> AgentSettings {
    let mut backoff = ExponentialBackoff::from_config(&config.handshake_retry);
    loop {
        match obtain_settings(transport, name, &config.broker_url, config.settings_timeout).await
        {
            Ok(settings) => return settings,
            Err(e) => {
                let delay = backoff.next_delay();
                tracing::warn!("Can't get agent settings: {}. Retrying in {:?}", e, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
