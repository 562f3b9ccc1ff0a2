//! CLI for pubsock
//!
//! Subcommands:
//! - `server`: run the subscriber transport, the sweep and the management API
//! - `subscribe`: connect as a subscriber and print what arrives

use std::sync::Arc;

use clap::Parser;
use pubsock::broker::{Registry, spawn_sweeper};
use pubsock::client::SubscriberClient;
use pubsock::config::load_config;
use pubsock::transport::{TransportLimits, Listener};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pubsock", version, about = "Minimal publish/subscribe broker")]
enum Command {
    /// Start the broker
    Server,
    /// Connect as a subscriber and print every delivered message
    Subscribe {
        /// Subscriber transport URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8080")]
        url: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cmd = Command::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            pubsock::utils::logging::init("info");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    pubsock::utils::logging::init(&config.logging.level);

    let result = match cmd {
        Command::Server => run_server(config).await,
        Command::Subscribe { url } => run_subscriber(&url).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run_server(config: pubsock::config::Settings) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(Registry::new());

    let server_addr = config.server.addr();
    let listener = Listener::bind(&server_addr, TransportLimits::from(&config.broker))
        .await
        .map_err(|e| format!("cannot bind subscriber transport on {server_addr}: {e}"))?;
    let api_addr = config.api.addr();

    let _sweeper = spawn_sweeper(registry.clone(), config.broker.sweep_interval());

    tokio::select! {
        _ = listener.run(registry.clone()) => {
            error!("Subscriber transport exited unexpectedly.");
        }
        result = pubsock::api::serve(&api_addr, registry) => {
            if let Err(e) = result {
                return Err(format!("management API on {api_addr} failed: {e}").into());
            }
            error!("Management API exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

async fn run_subscriber(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = SubscriberClient::connect(url).await?;
    println!("Subscribed as {}", client.id());

    while let Some(message) = client.next_message().await? {
        println!("{message}");
    }

    info!("Broker closed the connection");
    Ok(())
}
