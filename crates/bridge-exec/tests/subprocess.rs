use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bridge_exec::{spawn, ProcessRequest, DEFAULT_MAX_OUTPUT_BYTES};
use bridge_validate::CancellationScope;

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
async fn output_past_the_cap_is_dropped_and_flagged_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_fake_cli(dir.path(), "#!/bin/sh\nyes | head -c 4096\n");
    let request = ProcessRequest {
        binary,
        argv: vec![],
        env: vec![],
        working_dir: dir.path().to_path_buf(),
        accepts_stdin: false,
        deadline: Duration::from_secs(5),
        max_output_bytes: 1024,
        cancellation: CancellationScope::new(),
    };
    let mut process = spawn(request).unwrap();
    let mut collected = 0usize;
    while let Some(chunk) = process.stdout.recv().await {
        collected += chunk.len();
    }
    let completion = process.wait().await;
    assert!(completion.stdout_truncated);
    assert!(collected <= 1024);
}

#[tokio::test]
async fn stdin_is_closed_for_commands_that_do_not_accept_it() {
    let dir = tempfile::tempdir().unwrap();
    // `cat` with no args reads from stdin; if it isn't closed immediately it
    // hangs until the deadline instead of exiting on EOF.
    let binary = write_fake_cli(dir.path(), "#!/bin/sh\nexec cat\n");
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
    assert_eq!(completion.status, bridge_validate::ExecutionStatus::Completed);
}
