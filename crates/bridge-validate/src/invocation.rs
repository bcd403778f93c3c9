use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use crate::cancellation::CancellationScope;

/// A successfully validated and coerced argument value, mirroring
/// [`bridge_registry::ArgKind`]. `FileOfJson`/`FileOfYaml` arguments are kept
/// as structured data here — they are only materialized to disk by the
/// executor, immediately before argv construction.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    Enum(String),
    DatetimeRfc3339(chrono::DateTime<chrono::Utc>),
    JsonObject(Value),
    FileContent(Value),
    ArrayOfString(Vec<String>),
}

impl BoundValue {
    /// Renders the value as a single argv token. Panics on `FileContent`,
    /// which must be materialized by the executor before it ever reaches
    /// argv construction.
    pub fn as_argv_token(&self) -> String {
        match self {
            BoundValue::String(s) | BoundValue::Enum(s) => s.clone(),
            BoundValue::Integer(n) => n.to_string(),
            BoundValue::Float(f) => f.to_string(),
            BoundValue::Boolean(b) => b.to_string(),
            BoundValue::Uuid(u) => u.to_string(),
            BoundValue::DatetimeRfc3339(dt) => dt.to_rfc3339(),
            BoundValue::JsonObject(v) => v.to_string(),
            BoundValue::ArrayOfString(items) => items.join(","),
            BoundValue::FileContent(_) => {
                panic!("file-backed argument must be materialized before argv construction")
            }
        }
    }
}

/// Monotonic execution lifecycle, per the Data Model. Terminal states
/// (`Completed`, `Failed`, `TimedOut`, `Cancelled`) never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::TimedOut
                | ExecutionStatus::Cancelled
        )
    }

    /// Rejects backward or no-op transitions out of a terminal state.
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Queued, Running)
                | (Queued, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
                | (Running, Cancelled)
        )
    }
}

/// A validated, fully bound request, ready to be admitted to the executor
/// pool. Carries everything downstream layers need without falling back to
/// ambient/thread-local context (§9).
#[derive(Debug, Clone)]
pub struct Invocation {
    pub id: Uuid,
    pub command_name: String,
    pub arguments: HashMap<String, BoundValue>,
    pub principal_id: String,
    pub created_at: Instant,
    pub deadline: Instant,
    pub cancellation: CancellationScope,
}

impl Invocation {
    pub fn new(
        command_name: impl Into<String>,
        arguments: HashMap<String, BoundValue>,
        principal_id: impl Into<String>,
        max_runtime: Duration,
    ) -> Self {
        let created_at = Instant::now();
        Self {
            id: Uuid::new_v4(),
            command_name: command_name.into(),
            arguments,
            principal_id: principal_id.into(),
            created_at,
            deadline: created_at + max_runtime,
            cancellation: CancellationScope::new(),
        }
    }

    pub fn is_past_deadline(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_follow_the_state_machine() {
        assert!(ExecutionStatus::Queued.can_transition_to(ExecutionStatus::Running));
        assert!(ExecutionStatus::Running.can_transition_to(ExecutionStatus::Completed));
        assert!(!ExecutionStatus::Completed.can_transition_to(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Queued.can_transition_to(ExecutionStatus::Completed));
    }

    #[test]
    fn deadline_is_created_at_plus_max_runtime() {
        let inv = Invocation::new(
            "server.list",
            HashMap::new(),
            "user-1",
            Duration::from_secs(30),
        );
        assert!(inv.remaining() <= Duration::from_secs(30));
        assert!(!inv.is_past_deadline());
    }
}
