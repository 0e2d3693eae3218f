use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use bot_verifier::config::Config;
use bot_verifier::init::{init_registry, init_scopes, init_shared, setup_logging};
use bot_verifier::logger::DecisionLogger;
use bot_verifier::server::{self, ServerState};
use bot_verifier::stats::VerifierStats;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args().nth(1).unwrap_or("config.toml".to_string());
    let config_found = std::path::Path::new(&config_path).exists();
    let config = if config_found {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    // 2. Setup Logging
    setup_logging(&config);
    info!("Starting bot-verifier...");

    if !config_found {
        info!("Config file not found, using defaults.");
    }

    // 3. Provider Registry
    let registry = init_registry(&config)?;

    // 4. Init Stats
    let provider_names = registry.all().iter().map(|p| p.name().to_string()).collect();
    let stats = VerifierStats::new(provider_names);
    if config.stats.enable {
        stats.spawn_reporter(config.stats.log_interval_seconds);
    }

    // 5. Init Resolver
    let resolver = bot_verifier::resolver::create_resolver(&config.dns)?;

    // 6. Init DecisionLogger
    let decisions = DecisionLogger::new(config.logging.clone());

    // 7. Build Engines
    let shared = init_shared(&config, registry, resolver, stats.clone(), decisions)?;
    let scopes = init_scopes(&config, &shared);

    // 8. Start Server
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid listen host {}", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    let listener = TcpListener::bind(addr).await?;
    info!("Access-check server listening on {}", addr);

    let state = Arc::new(ServerState { scopes, stats });

    // 9. Graceful Shutdown
    server::serve(listener, state, async {
        let _ = signal::ctrl_c().await;
        info!("Shutdown signal received.");
    })
    .await
}
