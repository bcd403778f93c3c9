use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use bridge_validate::{Principal, RawRequest};

use crate::error::BridgeError;

/// Identity verification collaborator (§1 "out of scope: Auth provider").
/// Modeled as a capability object passed into the service at construction,
/// per §9 — never a global.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, raw: &RawRequest) -> Result<Principal, BridgeError>;
}

/// Resolves the absolute path to the external CLI binary the Executor Pool
/// spawns (§1 "out of scope: CLI Binary"). A real deployment might refresh
/// this from a package manager or bundle; the service only ever needs the
/// current path.
pub trait CliBinaryLocator: Send + Sync {
    fn locate(&self) -> Result<PathBuf, BridgeError>;
}

/// Test/demo `AuthProvider` that resolves principals from a fixed table of
/// bearer tokens, read from the `authorization` header.
#[derive(Default)]
pub struct StaticAuthProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn verify(&self, raw: &RawRequest) -> Result<Principal, BridgeError> {
        let token = raw
            .header
            .get("authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(BridgeError::Unauthenticated)?;
        self.tokens
            .get(token)
            .cloned()
            .ok_or(BridgeError::Unauthenticated)
    }
}

/// `CliBinaryLocator` that always returns the path it was built with —
/// fine for tests and for deployments that pin the binary at startup via
/// `--cli-binary`.
pub struct FixedCliBinaryLocator {
    path: PathBuf,
}

impl FixedCliBinaryLocator {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CliBinaryLocator for FixedCliBinaryLocator {
    fn locate(&self) -> Result<PathBuf, BridgeError> {
        if self.path.is_absolute() {
            Ok(self.path.clone())
        } else {
            Err(BridgeError::GeneralError {
                exit_code: None,
                stderr_tail: format!("cli binary path `{}` is not absolute", self.path.display()),
            })
        }
    }
}
