//! QueueStack - local SQS-compatible message broker
//!
//! Serves the SQS query protocol over HTTP, backed by in-memory queues.

mod config;
mod router;

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queuestack_sqs::{RegistryConfig, SqsState};

#[derive(Parser, Debug)]
#[command(name = "queuestack")]
#[command(about = "Local SQS-compatible message broker", long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "QUEUESTACK_PORT")]
    port: Option<u16>,

    /// Host to bind to
    #[arg(long, env = "QUEUESTACK_HOST")]
    host: Option<String>,

    /// Account ID embedded in queue URLs and ARNs
    #[arg(long, env = "QUEUESTACK_ACCOUNT_ID")]
    account_id: Option<String>,

    /// Region embedded in queue ARNs
    #[arg(long, env = "QUEUESTACK_REGION")]
    region: Option<String>,

    /// Base URL advertised in queue URLs (defaults to http://localhost:<port>)
    #[arg(long, env = "QUEUESTACK_ENDPOINT")]
    endpoint: Option<String>,

    /// Configuration file (defaults to ./queuestack.toml when present)
    #[arg(short, long, env = "QUEUESTACK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "QUEUESTACK_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "queuestack={level},queuestack_sqs={level},tower_http=debug",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Command-line flags and environment take precedence over the file
    let mut config = config::Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(account_id) = args.account_id {
        config.sqs.account_id = account_id;
    }
    if let Some(region) = args.region {
        config.sqs.region = region;
    }
    if args.endpoint.is_some() {
        config.sqs.endpoint = args.endpoint;
    }

    let registry_config = RegistryConfig {
        endpoint: config.endpoint(),
        account_id: config.sqs.account_id.clone(),
        region: config.sqs.region.clone(),
    };

    info!("Starting QueueStack...");
    info!(
        endpoint = %registry_config.endpoint,
        account_id = %registry_config.account_id,
        region = %registry_config.region,
        "SQS configuration"
    );

    let state = Arc::new(SqsState::new(registry_config));
    let app = router::create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("QueueStack stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
