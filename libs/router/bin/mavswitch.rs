//! MAVLink router binary.
//!
//! Usage:
//!   mavswitch -e udpin:0.0.0.0:14550 -e serial:/dev/ttyUSB0:57600
//!   mavswitch --config router.toml

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use mavswitch_common::MavMessage;
use mavswitch_network::UartPool;
use mavswitch_router::{spawn_endpoint, EndpointSpec, Router, RouterConfig, RouterSettings};

/// How many serial ports one router process may hold at once.
const UART_POOL_CAPACITY: usize = 8;

#[derive(Parser, Debug)]
#[command(name = "mavswitch")]
#[command(about = "MAVLink multi-link router")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Endpoint string (repeatable): udpin:<ip>:<port>, udpout:<ip>:<port>,
    /// tcpout:<ip>:<port>, serial:<device>:<baud>
    #[arg(short, long = "endpoint")]
    endpoints: Vec<String>,

    /// Local MAVLink system id
    #[arg(long)]
    system_id: Option<u8>,

    /// Local MAVLink component id
    #[arg(long)]
    component_id: Option<u8>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("starting mavswitch");

    // Configuration file first, command line on top.
    let mut settings = RouterSettings::default();
    let mut specs: Vec<EndpointSpec> = Vec::new();
    if let Some(path) = &args.config {
        let config = RouterConfig::from_file(path).map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to load configuration");
            e
        })?;
        settings.name = config.router.name.clone();
        settings.system_id = config.router.system_id;
        settings.component_id = config.router.component_id;
        specs = config.endpoint_specs()?;
    }
    for endpoint in &args.endpoints {
        specs.push(endpoint.parse::<EndpointSpec>()?);
    }
    if let Some(system_id) = args.system_id {
        settings.system_id = system_id;
    }
    if let Some(component_id) = args.component_id {
        settings.component_id = component_id;
    }
    anyhow::ensure!(
        !specs.is_empty(),
        "no endpoints configured; pass --endpoint or a --config file"
    );

    info!(
        system_id = settings.system_id,
        component_id = settings.component_id,
        endpoints = specs.len(),
        "configuration loaded"
    );

    let (router, handle, link_events) = Router::<MavMessage>::new(settings);
    let cancel = CancellationToken::new();
    let pool = UartPool::new(UART_POOL_CAPACITY);

    for spec in &specs {
        spawn_endpoint(spec, link_events.clone(), &pool, cancel.clone())
            .await
            .with_context(|| format!("failed to start endpoint {spec:?}"))?;
    }

    let router_task = tokio::spawn(router.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to install CTRL+C handler")?;
    info!("received shutdown signal");

    cancel.cancel();
    let _ = handle.shutdown().await;
    let _ = router_task.await;

    Ok(())
}

fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}
