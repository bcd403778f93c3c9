use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bridge_artifacts::TempArtifactManager;
use bridge_registry::CommandSpec;
use bridge_validate::{CancellationScope, Invocation};
use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time;
use tracing::info;
use uuid::Uuid;

use crate::argv::{build_argv, build_env};
use crate::error::ExecError;
use crate::process::{spawn, Completion, ProcessRequest, DEFAULT_MAX_OUTPUT_BYTES};

/// How long a `submit` call waits for a slot before returning
/// [`ExecError::PoolSaturated`] (§4.4: "brief admission wait").
const ADMISSION_WAIT: Duration = Duration::from_millis(250);

pub struct PoolConfig {
    pub cli_binary: PathBuf,
    pub scratch_root: PathBuf,
    pub total_slots: usize,
    pub streaming_overflow_slots: usize,
    pub max_output_bytes: usize,
}

impl PoolConfig {
    pub fn new(cli_binary: PathBuf, scratch_root: PathBuf) -> Self {
        Self {
            cli_binary,
            scratch_root,
            total_slots: 20,
            streaming_overflow_slots: 8,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

/// A bounded pool of subprocess worker slots. Submissions are served FIFO
/// (backed by [`tokio::sync::Semaphore`]'s fair wait queue) with one reserved
/// slot per command so long-running commands cannot starve quick ones, and a
/// separate overflow capacity for streaming commands (§4.4).
pub struct ExecutorPool {
    config: PoolConfig,
    global: Arc<Semaphore>,
    streaming_overflow: Arc<Semaphore>,
    reserved: DashMap<String, Arc<Semaphore>>,
    artifacts: Arc<TempArtifactManager>,
}

enum AcquiredSlot {
    Reserved(#[allow(dead_code)] OwnedSemaphorePermit),
    Global(#[allow(dead_code)] OwnedSemaphorePermit),
    Streaming(#[allow(dead_code)] OwnedSemaphorePermit),
}

impl ExecutorPool {
    pub fn new(config: PoolConfig, artifacts: Arc<TempArtifactManager>) -> Self {
        let global = Arc::new(Semaphore::new(config.total_slots));
        let streaming_overflow = Arc::new(Semaphore::new(config.streaming_overflow_slots));
        Self {
            config,
            global,
            streaming_overflow,
            reserved: DashMap::new(),
            artifacts,
        }
    }

    /// Enqueues `invocation` for execution under `spec`. Returns
    /// [`ExecError::PoolSaturated`] if no slot frees up within the admission
    /// window.
    pub async fn submit(
        &self,
        spec: &CommandSpec,
        invocation: Invocation,
    ) -> Result<ExecutionHandle, ExecError> {
        let slot = self.acquire_slot(spec).await?;

        let argv = build_argv(spec, &invocation, &self.artifacts).await?;
        let env = build_env(spec, &self.config.cli_binary);

        let request = ProcessRequest {
            binary: self.config.cli_binary.clone(),
            argv,
            env,
            working_dir: self.config.scratch_root.clone(),
            accepts_stdin: spec.accepts_stdin,
            deadline: invocation.remaining(),
            max_output_bytes: self.config.max_output_bytes,
            cancellation: invocation.cancellation.clone(),
        };

        info!(invocation_id = %invocation.id, command = %spec.name, "submitting invocation to executor pool");
        let process = spawn(request)?;

        Ok(ExecutionHandle {
            invocation_id: invocation.id,
            command_name: spec.name.clone(),
            cancellation: invocation.cancellation,
            artifacts: self.artifacts.clone(),
            process,
            _slot: slot,
        })
    }

    async fn acquire_slot(&self, spec: &CommandSpec) -> Result<AcquiredSlot, ExecError> {
        if spec.is_streaming {
            let overflow = self.streaming_overflow.clone();
            return match time::timeout(ADMISSION_WAIT, overflow.acquire_owned()).await {
                Ok(Ok(permit)) => Ok(AcquiredSlot::Streaming(permit)),
                _ => Err(ExecError::PoolSaturated),
            };
        }

        let reserved = self
            .reserved
            .entry(spec.name.clone())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone();
        if let Ok(permit) = reserved.try_acquire_owned() {
            return Ok(AcquiredSlot::Reserved(permit));
        }

        let global = self.global.clone();
        match time::timeout(ADMISSION_WAIT, global.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(AcquiredSlot::Global(permit)),
            _ => Err(ExecError::PoolSaturated),
        }
    }
}

/// A running execution, tying together its subprocess I/O streams,
/// cancellation control, and artifact cleanup (released on completion
/// regardless of how it terminated).
pub struct ExecutionHandle {
    pub invocation_id: Uuid,
    pub command_name: String,
    cancellation: CancellationScope,
    artifacts: Arc<TempArtifactManager>,
    process: crate::process::RunningProcess,
    _slot: AcquiredSlot,
}

impl ExecutionHandle {
    pub fn stdout(&mut self) -> &mut tokio::sync::mpsc::Receiver<Vec<u8>> {
        &mut self.process.stdout
    }

    pub fn stderr(&mut self) -> &mut tokio::sync::mpsc::Receiver<Vec<u8>> {
        &mut self.process.stderr
    }

    /// Both output streams borrowed at once, for a parser driver that reads
    /// stdout and stderr concurrently (§4.4.7).
    pub fn io_mut(
        &mut self,
    ) -> (
        &mut tokio::sync::mpsc::Receiver<Vec<u8>>,
        &mut tokio::sync::mpsc::Receiver<Vec<u8>>,
    ) {
        (&mut self.process.stdout, &mut self.process.stderr)
    }

    /// Requests prompt termination (SIGTERM + grace + SIGKILL). Already
    /// buffered events remain available to drain; the completion transitions
    /// to `cancelled` once the process tree has actually exited.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub async fn wait(self) -> Completion {
        let completion = self.process.wait().await;
        self.artifacts.release(self.invocation_id).await;
        completion
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_registry::default_catalog;
    use bridge_validate::BoundValue;
    use std::collections::HashMap;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_fake_cli(dir: &std::path::Path, script: &str) -> PathBuf {
        let path = dir.join("fake-cli");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(script.as_bytes()).unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    async fn pool(dir: &std::path::Path, script: &str) -> ExecutorPool {
        let binary = write_fake_cli(dir, script);
        let artifacts = Arc::new(
            TempArtifactManager::new(dir.join("artifacts"))
                .await
                .unwrap(),
        );
        ExecutorPool::new(PoolConfig::new(binary, dir.to_path_buf()), artifacts)
    }

    #[tokio::test]
    async fn submit_runs_version_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(dir.path(), "#!/bin/sh\necho '{\"version\":\"1.0\"}'\n").await;
        let spec = default_catalog()
            .into_iter()
            .find(|s| s.name == "version")
            .unwrap();
        let invocation =
            Invocation::new("version", HashMap::new(), "user-1", Duration::from_secs(5));
        let mut handle = pool.submit(&spec, invocation).await.unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = handle.stdout().recv().await {
            out.extend(chunk);
        }
        let completion = handle.wait().await;
        assert!(matches!(
            completion.status,
            bridge_validate::ExecutionStatus::Completed
        ));
        assert!(String::from_utf8(out).unwrap().contains("version"));
    }

    #[tokio::test]
    async fn reserved_slot_lets_a_quick_command_run_when_global_pool_is_full() {
        let dir = tempfile::tempdir().unwrap();
        let binary = write_fake_cli(dir.path(), "#!/bin/sh\nsleep 2\n");
        let artifacts = Arc::new(
            TempArtifactManager::new(dir.path().join("artifacts"))
                .await
                .unwrap(),
        );
        let mut config = PoolConfig::new(binary, dir.path().to_path_buf());
        config.total_slots = 1;
        let pool = ExecutorPool::new(config, artifacts);

        let spec = default_catalog()
            .into_iter()
            .find(|s| s.name == "version")
            .unwrap();

        let invocation_a =
            Invocation::new("version", HashMap::new(), "user-1", Duration::from_secs(5));
        let handle_a = pool.submit(&spec, invocation_a).await.unwrap();

        // Global pool now has zero free permits, but "version" has its own
        // reserved slot, so a second submission of the *same* command still
        // succeeds immediately.
        let invocation_b =
            Invocation::new("version", HashMap::new(), "user-1", Duration::from_secs(5));
        let handle_b = pool.submit(&spec, invocation_b).await.unwrap();

        handle_a.cancel();
        handle_b.cancel();
        let _ = handle_a.wait().await;
        let _ = handle_b.wait().await;
    }

    #[tokio::test]
    async fn file_backed_argument_is_staged_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(dir.path(), "#!/bin/sh\ncat \"$2\"\n").await;
        let spec = default_catalog()
            .into_iter()
            .find(|s| s.name == "config.set")
            .unwrap();
        let mut args = HashMap::new();
        args.insert(
            "configFile".to_string(),
            BoundValue::FileContent(serde_json::json!({"k": "v"})),
        );
        let invocation =
            Invocation::new("config.set", args, "user-1", Duration::from_secs(5));
        let mut handle = pool.submit(&spec, invocation).await.unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = handle.stdout().recv().await {
            out.extend(chunk);
        }
        let completion = handle.wait().await;
        assert!(matches!(
            completion.status,
            bridge_validate::ExecutionStatus::Completed
        ));
        assert!(String::from_utf8(out).unwrap().contains("\"k\""));
    }
}
