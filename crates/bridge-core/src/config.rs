use std::path::PathBuf;
use std::time::Duration;

use bridge_exec::DEFAULT_MAX_OUTPUT_BYTES;

/// Everything `BridgeService::start` needs, assembled from `bridge-cli`'s
/// parsed flags (§6 CLI / operator surface, §12 Configuration) or directly
/// by an embedding test.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Absolute path to the external CLI binary (`--cli-binary`).
    pub cli_binary: PathBuf,
    /// Root directory for temp artifacts (`--temp-root`).
    pub temp_root: PathBuf,
    /// Optional TOML catalog overlay (`--catalog`).
    pub catalog_overlay: Option<PathBuf>,
    /// Executor pool worker count (`--pool-size`).
    pub pool_size: usize,
    /// Per-invocation output cap in bytes (`--max-output`).
    pub max_output_bytes: usize,
    /// Graceful shutdown deadline (`--shutdown-grace`).
    pub shutdown_grace: Duration,
    /// Ring buffer capacity for newly registered streams.
    pub stream_ring_capacity: usize,
    /// How long a finished stream stays registered for late subscribers.
    pub stream_finish_grace: Duration,
    /// Max age before the artifact sweeper reaps an orphaned temp file.
    pub artifact_max_age: Duration,
}

impl BridgeConfig {
    pub fn new(cli_binary: PathBuf, temp_root: PathBuf) -> Self {
        Self {
            cli_binary,
            temp_root,
            catalog_overlay: None,
            pool_size: 20,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            shutdown_grace: Duration::from_secs(30),
            stream_ring_capacity: 1000,
            stream_finish_grace: bridge_stream::DEFAULT_FINISH_GRACE,
            artifact_max_age: Duration::from_secs(3600),
        }
    }
}
