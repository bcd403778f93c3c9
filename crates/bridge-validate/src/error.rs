use thiserror::Error;

/// Validation failures, surfaced before any subprocess is spawned (§4.2,
/// universal invariant 1).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("argument `{name}` is invalid: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("command `{0}` is not in the registry")]
    UnknownCommand(String),
}

impl ValidationError {
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
