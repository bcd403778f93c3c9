use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use bridge_artifacts::ArtifactError;
use bridge_exec::ExecError;
use bridge_registry::RegistryError;
use bridge_resilience::ResilienceError;
use bridge_stream::StreamError;
use bridge_validate::ValidationError;

/// The one error type every public `BridgeService` method returns,
/// regardless of which layer rejected the request (§7). Carries enough
/// structure to build a `{ error: { code, message, details, traceId } }`
/// response body without this crate knowing anything about HTTP.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("argument `{name}` is invalid: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("the request's principal could not be verified")]
    Unauthenticated,

    #[error("principal lacks a required capability for this command")]
    Forbidden,

    #[error("`{0}` was not found")]
    NotFound(String),

    #[error("the external binary reported a conflict")]
    Conflict,

    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("circuit breaker is open, retry after {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    #[error("executor pool is saturated")]
    PoolSaturated,

    #[error("invocation exceeded its deadline")]
    Timeout,

    #[error("invocation was cancelled")]
    Cancelled,

    #[error("the external binary produced output the parser could not make sense of")]
    ParsingError(String),

    #[error("command exited with code {exit_code:?}")]
    GeneralError {
        exit_code: Option<i32>,
        stderr_tail: String,
    },
}

impl BridgeError {
    /// Short machine-readable category, the `code` field of §7's response
    /// body.
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument { .. } => "invalid_argument",
            BridgeError::Unauthenticated => "unauthenticated",
            BridgeError::Forbidden => "forbidden",
            BridgeError::NotFound(_) => "not_found",
            BridgeError::Conflict => "conflict",
            BridgeError::RateLimited { .. } => "rate_limited",
            BridgeError::CircuitOpen { .. } => "circuit_open",
            BridgeError::PoolSaturated => "pool_saturated",
            BridgeError::Timeout => "timeout",
            BridgeError::Cancelled => "cancelled",
            BridgeError::ParsingError(_) => "parsing_error",
            BridgeError::GeneralError { .. } => "general_error",
        }
    }

    /// How long the caller should wait before retrying, when that applies.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BridgeError::RateLimited { retry_after } | BridgeError::CircuitOpen { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// Builds the body every public boundary returns on failure (§7).
    pub fn into_body(self, trace_id: Uuid) -> ErrorBody {
        let code = self.code().to_string();
        let retry_after = self.retry_after().map(|d| d.as_secs_f64());
        let details = match &self {
            BridgeError::InvalidArgument { name, reason } => {
                Some(serde_json::json!({ "name": name, "reason": reason }))
            }
            BridgeError::GeneralError { exit_code, stderr_tail } => {
                Some(serde_json::json!({ "exitCode": exit_code, "stderrTail": stderr_tail }))
            }
            _ => None,
        };
        ErrorBody {
            code,
            message: self.to_string(),
            details,
            retry_after,
            trace_id,
        }
    }
}

/// Wire shape of §7's `{ error: { code, message, details?, traceId } }`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
    #[serde(rename = "traceId")]
    pub trace_id: Uuid,
}

impl From<RegistryError> for BridgeError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => BridgeError::NotFound(name),
            other => BridgeError::InvalidArgument {
                name: "command".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<ValidationError> for BridgeError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidArgument { name, reason } => {
                BridgeError::InvalidArgument { name, reason }
            }
            ValidationError::UnknownCommand(name) => BridgeError::NotFound(name),
        }
    }
}

impl From<ArtifactError> for BridgeError {
    fn from(err: ArtifactError) -> Self {
        BridgeError::GeneralError {
            exit_code: None,
            stderr_tail: err.to_string(),
        }
    }
}

impl From<ResilienceError> for BridgeError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::RateLimited { retry_after } => BridgeError::RateLimited { retry_after },
            ResilienceError::CircuitOpen => BridgeError::CircuitOpen {
                retry_after: Duration::from_secs(30),
            },
        }
    }
}

impl From<ExecError> for BridgeError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::PoolSaturated => BridgeError::PoolSaturated,
            ExecError::TimedOut => BridgeError::Timeout,
            ExecError::Cancelled => BridgeError::Cancelled,
            other => BridgeError::GeneralError {
                exit_code: None,
                stderr_tail: other.to_string(),
            },
        }
    }
}

impl From<StreamError> for BridgeError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::NotFound(id) => BridgeError::NotFound(id.to_string()),
            StreamError::AlreadyFinished(_) => BridgeError::Conflict,
        }
    }
}
