use std::sync::Arc;

use clap::Parser;
use token_relay::config::proc_loader::ConfigMode;
use token_relay::server::proxy::Relay;
use token_relay::server;
use token_relay::utils::config_loader;
use token_relay::utils::logging;
use anyhow::Result;
use token_relay::utils::logging::LogLevel;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "token-relay.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL" , value_enum)]
    log_level: Option<LogLevel>,
    /// keep serving with token handling disabled when token_config is broken
    #[arg(long, env = "LENIENT")]
    lenient: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config
    // -------------------------------

    let args = Args::parse();
    let mode = if args.lenient { ConfigMode::Lenient } else { ConfigMode::Strict };

    let service_config = config_loader::run(&args.config, mode).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Wire services, token cache and retry coordinator
    // -------------------------------

    let relay = Arc::new(Relay::from_config(&service_config)?);
    if !relay.is_token_handling_enabled() {
        warn!("token handling is disabled, requests are forwarded untouched");
    }

    // -------------------------------
    // 3. Serve until shutdown
    // -------------------------------

    info!("Service starting...");
    server::server::start(&service_config.settings, relay).await?;

    Ok(())
}
