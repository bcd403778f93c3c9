use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bridge_core::{BridgeConfig, BridgeService, FixedCliBinaryLocator, StaticAuthProvider};
use bridge_resilience::InMemoryAuditSink;

/// Recognizes exactly the options spec §6 lists for the service binary.
/// `--bind` is accepted and stored, but this binary hosts the bridge core
/// directly and leaves HTTP framing to an out-of-scope front; it never
/// opens a socket itself.
#[derive(Debug, Parser)]
#[command(name = "bridge-cli", about = "Hosts the CLI bridge core")]
struct Args {
    /// HTTP bind address (accepted for compatibility with the operator
    /// surface; this binary does not itself listen on it).
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Absolute path to the external CLI binary.
    #[arg(long)]
    cli_binary: PathBuf,

    /// Root directory for temp artifacts.
    #[arg(long)]
    temp_root: PathBuf,

    /// Executor pool worker count.
    #[arg(long, default_value_t = 20)]
    pool_size: usize,

    /// Per-invocation output cap, in bytes.
    #[arg(long)]
    max_output: Option<usize>,

    /// Graceful shutdown deadline, in seconds.
    #[arg(long, default_value_t = 30)]
    shutdown_grace: u64,

    /// Optional TOML catalog overlay, merged over the built-in command
    /// catalog by name (§12 "command catalog configuration").
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if !args.cli_binary.is_absolute() {
        error!(path = %args.cli_binary.display(), "--cli-binary must be an absolute path");
        std::process::exit(1);
    }

    let mut config = BridgeConfig::new(args.cli_binary.clone(), args.temp_root.clone());
    config.pool_size = args.pool_size;
    config.shutdown_grace = Duration::from_secs(args.shutdown_grace);
    config.catalog_overlay = args.catalog;
    if let Some(max_output) = args.max_output {
        config.max_output_bytes = max_output;
    }

    let locator = Arc::new(FixedCliBinaryLocator::new(&args.cli_binary));
    let auth = Arc::new(StaticAuthProvider::new());
    let audit = Arc::new(InMemoryAuditSink::new());

    let service = match BridgeService::build(config, locator, auth, audit).await {
        Ok(service) => service,
        Err(err) => {
            error!(%err, "failed to start the bridge service");
            std::process::exit(1);
        }
    };

    info!(bind = %args.bind, "bridge-cli listening (HTTP framing is hosted by an external front)");
    service.start().await;

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to install the shutdown signal handler");
        std::process::exit(2);
    }

    info!("shutdown signal received");
    service.shutdown(Duration::from_secs(args.shutdown_grace)).await;
}
