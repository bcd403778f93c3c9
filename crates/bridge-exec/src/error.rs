use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("resolving the cli binary failed: {0}")]
    BinaryNotFound(String),
    #[error("temp artifact materialization failed: {0}")]
    Artifact(#[from] bridge_artifacts::ArtifactError),
    #[error("process `{binary}` could not be spawned: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to capture stdout of `{binary}`")]
    StdoutUnavailable { binary: PathBuf },
    #[error("failed to capture stderr of `{binary}`")]
    StderrUnavailable { binary: PathBuf },
    #[error("failed to wait for process: {source}")]
    Wait {
        #[source]
        source: std::io::Error,
    },
    #[error("execution exceeded its deadline")]
    TimedOut,
    #[error("execution was cancelled")]
    Cancelled,
    #[error("executor pool is saturated, try again later")]
    PoolSaturated,
    #[error("failed to join output-reader task: {0}")]
    Join(#[from] tokio::task::JoinError),
}
