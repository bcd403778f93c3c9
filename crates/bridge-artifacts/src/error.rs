use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create artifact root `{path}`: {source}")]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize artifact `{key}` as json: {source}")]
    SerializeJson {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize artifact `{key}` as yaml: {source}")]
    SerializeYaml {
        key: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to write artifact `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to restrict permissions on artifact `{path}`: {source}")]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
