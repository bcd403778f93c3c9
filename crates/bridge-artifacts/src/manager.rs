use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ArtifactError;

/// Serialization format a `file-of-*` argument is staged in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Json,
    Yaml,
}

/// Owns a dedicated directory that file-backed command arguments are
/// materialized into before a subprocess is spawned, and released once the
/// invocation that owns them terminates (§4.3).
///
/// One instance is constructed at startup and passed to every invocation as
/// a collaborator; there is no process-wide ambient singleton.
pub struct TempArtifactManager {
    root: PathBuf,
    registered: Mutex<HashMap<Uuid, Vec<PathBuf>>>,
}

impl TempArtifactManager {
    /// Creates (if needed) `root` with owner-only permissions and returns a
    /// manager rooted there.
    pub async fn new(root: PathBuf) -> Result<Self, ArtifactError> {
        fs::create_dir_all(&root)
            .await
            .map_err(|source| ArtifactError::CreateRoot {
                path: root.clone(),
                source,
            })?;
        restrict_to_owner(&root).await?;
        Ok(Self {
            root,
            registered: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Serializes `value` in `format` to a file named after `invocation_id`,
    /// `key`, and a random suffix, mode owner-read/write only, and registers
    /// the path against `invocation_id` for later release.
    pub async fn materialize(
        &self,
        invocation_id: Uuid,
        key: &str,
        value: &Value,
        format: ArtifactFormat,
    ) -> Result<PathBuf, ArtifactError> {
        let (contents, extension) = match format {
            ArtifactFormat::Json => (
                serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::SerializeJson {
                    key: key.to_string(),
                    source,
                })?,
                "json",
            ),
            ArtifactFormat::Yaml => (
                serde_yaml::to_string(value)
                    .map_err(|source| ArtifactError::SerializeYaml {
                        key: key.to_string(),
                        source,
                    })?
                    .into_bytes(),
                "yaml",
            ),
        };

        let suffix = Uuid::new_v4();
        let sanitized_key = sanitize_key(key);
        let file_name = format!("{invocation_id}-{sanitized_key}-{suffix}.{extension}");
        let path = self.root.join(file_name);

        fs::write(&path, &contents)
            .await
            .map_err(|source| ArtifactError::Write {
                path: path.clone(),
                source,
            })?;
        restrict_to_owner(&path).await?;

        self.registered
            .lock()
            .expect("artifact registry mutex poisoned")
            .entry(invocation_id)
            .or_default()
            .push(path.clone());

        debug!(%invocation_id, key, path = %path.display(), "materialized temp artifact");
        Ok(path)
    }

    /// Best-effort delete of every path registered to `invocation_id`.
    /// Idempotent: calling it twice, or with no registered paths, is a no-op.
    pub async fn release(&self, invocation_id: Uuid) {
        let paths = self
            .registered
            .lock()
            .expect("artifact registry mutex poisoned")
            .remove(&invocation_id)
            .unwrap_or_default();

        for path in paths {
            if let Err(source) = fs::remove_file(&path).await {
                if source.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), %source, "failed to release temp artifact");
                }
            }
        }
    }

    /// Number of invocations with at least one outstanding artifact. Used by
    /// tests and the sweeper's logging, not by any correctness path.
    pub fn outstanding_invocations(&self) -> usize {
        self.registered
            .lock()
            .expect("artifact registry mutex poisoned")
            .len()
    }

    /// Best-effort removal of the whole temp artifact root, called on
    /// service shutdown so no orphaned file survives the process. Missing
    /// paths inside the tree are tolerated; only a failure to remove the
    /// root itself is logged.
    pub async fn remove_root(&self) {
        if let Err(source) = fs::remove_dir_all(&self.root).await {
            if source.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.root.display(), %source, "failed to remove temp artifact root");
            }
        }
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(unix)]
async fn restrict_to_owner(path: &Path) -> Result<(), ArtifactError> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = fs::metadata(path)
        .await
        .map_err(|source| ArtifactError::Permissions {
            path: path.to_path_buf(),
            source,
        })?;
    let is_dir = metadata.is_dir();
    let mode = if is_dir { 0o700 } else { 0o600 };
    let mut permissions = metadata.permissions();
    permissions.set_mode(mode);
    fs::set_permissions(path, permissions)
        .await
        .map_err(|source| ArtifactError::Permissions {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn restrict_to_owner(_path: &Path) -> Result<(), ArtifactError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn materialize_writes_json_with_restricted_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let invocation_id = Uuid::new_v4();
        let path = manager
            .materialize(invocation_id, "configFile", &json!({"a": 1}), ArtifactFormat::Json)
            .await
            .unwrap();
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"a\""));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[tokio::test]
    async fn release_deletes_all_paths_for_an_invocation_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let invocation_id = Uuid::new_v4();
        let path = manager
            .materialize(invocation_id, "entryFile", &json!({}), ArtifactFormat::Json)
            .await
            .unwrap();
        assert!(path.exists());

        manager.release(invocation_id).await;
        assert!(!path.exists());
        assert_eq!(manager.outstanding_invocations(), 0);

        // Second release is a no-op, not an error.
        manager.release(invocation_id).await;
    }

    #[tokio::test]
    async fn two_invocations_never_share_a_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TempArtifactManager::new(dir.path().join("artifacts"))
            .await
            .unwrap();
        let a = manager
            .materialize(Uuid::new_v4(), "configFile", &json!({}), ArtifactFormat::Json)
            .await
            .unwrap();
        let b = manager
            .materialize(Uuid::new_v4(), "configFile", &json!({}), ArtifactFormat::Json)
            .await
            .unwrap();
        assert_ne!(a, b);
    }
}
