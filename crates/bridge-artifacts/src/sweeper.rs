use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Safety net behind invocation-scoped release: deletes any file under `root`
/// whose modification time is older than `max_age`, regardless of whether it
/// is still registered to a live invocation (§4.3).
pub async fn sweep_once(root: &Path, max_age: Duration) -> usize {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(source) => {
            warn!(root = %root.display(), %source, "sweeper could not read artifact root");
            return 0;
        }
    };

    let now = std::time::SystemTime::now();
    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(source) => {
                warn!(root = %root.display(), %source, "sweeper failed reading a directory entry");
                break;
            }
        };

        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        if metadata.is_dir() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.map(|age| age > max_age).unwrap_or(false) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %path.display(), "sweeper removed stale artifact");
                }
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => {
                    warn!(path = %path.display(), %source, "sweeper failed to remove stale artifact");
                }
            }
        }
    }
    removed
}

/// A handle to a background sweeper task; dropping it does not stop the
/// task, call [`Self::stop`] to request a graceful shutdown.
pub struct SweeperHandle {
    stop_flag: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub async fn stop(self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        let _ = self.task.await;
    }
}

/// Spawns a task that calls [`sweep_once`] every `interval` until stopped.
pub fn spawn_periodic_sweeper(root: PathBuf, max_age: Duration, interval: Duration) -> SweeperHandle {
    let stop_flag = Arc::new(AtomicBool::new(false));
    let task_flag = stop_flag.clone();
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if task_flag.load(Ordering::SeqCst) {
                break;
            }
            sweep_once(&root, max_age).await;
        }
    });
    SweeperHandle { stop_flag, task }
}
