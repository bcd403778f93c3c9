use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_validate::{CancellationScope, ExecutionStatus};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, warn};

use crate::error::ExecError;

/// Grace period between SIGTERM and SIGKILL when terminating a subprocess
/// (deadline expiry or explicit cancellation), per §4.4.5/§4.4.9.
pub const TERMINATION_GRACE: Duration = Duration::from_secs(5);

/// Default cap on bytes forwarded from a single stream before further output
/// is silently dropped (a `Warning` is the parser layer's job to emit).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Everything the executor pool needs to spawn a subprocess for one
/// invocation.
pub struct ProcessRequest {
    pub binary: PathBuf,
    pub argv: Vec<OsString>,
    pub env: Vec<(String, String)>,
    pub working_dir: PathBuf,
    pub accepts_stdin: bool,
    pub deadline: Duration,
    pub max_output_bytes: usize,
    pub cancellation: CancellationScope,
}

/// Outcome of a completed (or terminated) subprocess execution.
#[derive(Debug, Clone)]
pub struct Completion {
    pub status: ExecutionStatus,
    pub exit_code: Option<i32>,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

/// A subprocess in flight: two lazy byte-chunk sequences and a completion
/// future, per the Executor Pool's `ExecutionHandle` contract (§4.4).
pub struct RunningProcess {
    pub stdout: mpsc::Receiver<Vec<u8>>,
    pub stderr: mpsc::Receiver<Vec<u8>>,
    completion: oneshot::Receiver<Completion>,
}

impl RunningProcess {
    pub async fn wait(self) -> Completion {
        self.completion.await.unwrap_or(Completion {
            status: ExecutionStatus::Failed,
            exit_code: None,
            stdout_truncated: false,
            stderr_truncated: false,
        })
    }
}

/// Spawns `request.binary` with the given argv/env, never through a shell,
/// and drives it to completion on a background task while streaming stdout
/// and stderr to the caller as they arrive.
pub fn spawn(request: ProcessRequest) -> Result<RunningProcess, ExecError> {
    let mut command = Command::new(&request.binary);
    command
        .args(&request.argv)
        .env_clear()
        .envs(request.env.iter().cloned())
        .current_dir(&request.working_dir)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);

    command.stdin(if request.accepts_stdin {
        std::process::Stdio::piped()
    } else {
        std::process::Stdio::null()
    });

    let mut child = command.spawn().map_err(|source| ExecError::Spawn {
        binary: request.binary.clone(),
        source,
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExecError::StdoutUnavailable {
            binary: request.binary.clone(),
        })?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ExecError::StderrUnavailable {
            binary: request.binary.clone(),
        })?;

    let (stdout_tx, stdout_rx) = mpsc::channel(256);
    let (stderr_tx, stderr_rx) = mpsc::channel(256);
    let (completion_tx, completion_rx) = oneshot::channel();

    let stdout_task = tokio::spawn(forward_capped(stdout, stdout_tx, request.max_output_bytes));
    let stderr_task = tokio::spawn(forward_capped(stderr, stderr_tx, request.max_output_bytes));

    tokio::spawn(supervise(
        child,
        stdout_task,
        stderr_task,
        request.deadline,
        request.cancellation,
        completion_tx,
    ));

    Ok(RunningProcess {
        stdout: stdout_rx,
        stderr: stderr_rx,
        completion: completion_rx,
    })
}

async fn forward_capped<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>, max_bytes: usize) -> bool
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    let mut forwarded = 0usize;
    let mut truncated = false;
    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(source) => {
                warn!(%source, "error reading subprocess output stream");
                break;
            }
        };
        if forwarded >= max_bytes {
            truncated = true;
            continue;
        }
        let take = n.min(max_bytes - forwarded);
        forwarded += take;
        if take < n {
            truncated = true;
        }
        if tx.send(chunk[..take].to_vec()).await.is_err() {
            break;
        }
    }
    truncated
}

async fn supervise(
    mut child: Child,
    stdout_task: tokio::task::JoinHandle<bool>,
    stderr_task: tokio::task::JoinHandle<bool>,
    deadline: Duration,
    cancellation: CancellationScope,
    completion_tx: oneshot::Sender<Completion>,
) {
    let pid = child.id();

    let outcome = tokio::select! {
        status = child.wait() => WaitOutcome::Exited(status),
        _ = time::sleep(deadline) => WaitOutcome::TimedOut,
        _ = cancellation.cancelled() => WaitOutcome::Cancelled,
    };

    let (exec_status, exit_code) = match outcome {
        WaitOutcome::Exited(status) => {
            let status = status.ok();
            let code = status.and_then(|s| s.code());
            let success = status.map(|s| s.success()).unwrap_or(false);
            if success {
                (ExecutionStatus::Completed, code)
            } else {
                (ExecutionStatus::Failed, code)
            }
        }
        WaitOutcome::TimedOut => {
            terminate(pid, &mut child).await;
            let _ = child.wait().await;
            (ExecutionStatus::TimedOut, None)
        }
        WaitOutcome::Cancelled => {
            terminate(pid, &mut child).await;
            let _ = child.wait().await;
            (ExecutionStatus::Cancelled, None)
        }
    };

    let stdout_truncated = stdout_task.await.unwrap_or(false);
    let stderr_truncated = stderr_task.await.unwrap_or(false);

    debug!(pid, ?exec_status, exit_code, "subprocess execution finished");

    let _ = completion_tx.send(Completion {
        status: exec_status,
        exit_code,
        stdout_truncated,
        stderr_truncated,
    });
}

enum WaitOutcome {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

#[cfg(unix)]
async fn terminate(pid: Option<u32>, child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        let nix_pid = Pid::from_raw(pid as i32);
        if kill(nix_pid, Signal::SIGTERM).is_ok() {
            if time::timeout(TERMINATION_GRACE, child.wait()).await.is_ok() {
                return;
            }
        }
        let _ = kill(nix_pid, Signal::SIGKILL);
    }
    let _ = child.start_kill();
}

#[cfg(not(unix))]
async fn terminate(_pid: Option<u32>, child: &mut Child) {
    let _ = child.start_kill();
}

pub fn resolve_working_dir(scratch_root: &Path) -> PathBuf {
    scratch_root.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn write_fake_cli(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("fake-cli");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(script.as_bytes()).unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn successful_exit_reports_completed() {
        let dir = tempfile::tempdir().unwrap();
        let binary = write_fake_cli(dir.path(), "#!/bin/sh\necho hello\nexit 0\n");
        let request = ProcessRequest {
            binary,
            argv: vec![],
            env: vec![],
            working_dir: dir.path().to_path_buf(),
            accepts_stdin: false,
            deadline: Duration::from_secs(5),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cancellation: CancellationScope::new(),
        };
        let mut process = spawn(request).unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = process.stdout.recv().await {
            collected.extend(chunk);
        }
        let completion = process.wait().await;
        assert_eq!(completion.status, ExecutionStatus::Completed);
        assert_eq!(completion.exit_code, Some(0));
        assert_eq!(String::from_utf8(collected).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn nonzero_exit_reports_failed() {
        let dir = tempfile::tempdir().unwrap();
        let binary = write_fake_cli(dir.path(), "#!/bin/sh\nexit 3\n");
        let request = ProcessRequest {
            binary,
            argv: vec![],
            env: vec![],
            working_dir: dir.path().to_path_buf(),
            accepts_stdin: false,
            deadline: Duration::from_secs(5),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cancellation: CancellationScope::new(),
        };
        let process = spawn(request).unwrap();
        let completion = process.wait().await;
        assert_eq!(completion.status, ExecutionStatus::Failed);
        assert_eq!(completion.exit_code, Some(3));
    }

    #[tokio::test]
    async fn deadline_expiry_times_out_a_hanging_process() {
        let dir = tempfile::tempdir().unwrap();
        let binary = write_fake_cli(dir.path(), "#!/bin/sh\nsleep 30\n");
        let request = ProcessRequest {
            binary,
            argv: vec![],
            env: vec![],
            working_dir: dir.path().to_path_buf(),
            accepts_stdin: false,
            deadline: Duration::from_millis(100),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cancellation: CancellationScope::new(),
        };
        let process = spawn(request).unwrap();
        let completion = process.wait().await;
        assert_eq!(completion.status, ExecutionStatus::TimedOut);
    }

    #[tokio::test]
    async fn cancellation_terminates_the_process_promptly() {
        let dir = tempfile::tempdir().unwrap();
        let binary = write_fake_cli(dir.path(), "#!/bin/sh\nsleep 30\n");
        let cancellation = CancellationScope::new();
        let request = ProcessRequest {
            binary,
            argv: vec![],
            env: vec![],
            working_dir: dir.path().to_path_buf(),
            accepts_stdin: false,
            deadline: Duration::from_secs(30),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cancellation: cancellation.clone(),
        };
        let process = spawn(request).unwrap();
        cancellation.cancel();
        let completion = process.wait().await;
        assert_eq!(completion.status, ExecutionStatus::Cancelled);
    }
}
