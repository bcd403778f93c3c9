use std::collections::HashMap;

use async_trait::async_trait;
use bridge_registry::CommandSpec;
use bridge_validate::BoundValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Argument values as they appear on an audit record: `file-of-*` arguments
/// are redacted to their serialized size rather than their contents (§4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AuditArgument {
    Value(Value),
    RedactedFileSize { bytes: usize },
}

/// One terminal-transition audit record, handed to an [`AuditSink`] for
/// every invocation regardless of how it ended.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub invocation_id: Uuid,
    pub principal_id: String,
    pub command_name: String,
    pub arguments: HashMap<String, AuditArgument>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub error_category: Option<String>,
    pub origin_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Redacts `file-of-*` arguments to their size, passing everything else
/// through as its bound JSON representation.
pub fn redact_arguments(
    spec: &CommandSpec,
    arguments: &HashMap<String, BoundValue>,
) -> HashMap<String, AuditArgument> {
    arguments
        .iter()
        .map(|(name, value)| {
            let is_file_backed = spec
                .schema_for(name)
                .map(|entry| entry.kind.is_file_backed())
                .unwrap_or(false);
            let audit_value = match (is_file_backed, value) {
                (true, BoundValue::FileContent(content)) => AuditArgument::RedactedFileSize {
                    bytes: serde_json::to_vec(content).map(|bytes| bytes.len()).unwrap_or(0),
                },
                _ => AuditArgument::Value(bound_value_to_json(value)),
            };
            (name.clone(), audit_value)
        })
        .collect()
}

fn bound_value_to_json(value: &BoundValue) -> Value {
    match value {
        BoundValue::String(s) | BoundValue::Enum(s) => Value::String(s.clone()),
        BoundValue::Integer(n) => Value::from(*n),
        BoundValue::Float(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        BoundValue::Boolean(b) => Value::Bool(*b),
        BoundValue::Uuid(id) => Value::String(id.to_string()),
        BoundValue::DatetimeRfc3339(dt) => Value::String(dt.to_rfc3339()),
        BoundValue::JsonObject(v) | BoundValue::FileContent(v) => v.clone(),
        BoundValue::ArrayOfString(items) => {
            Value::Array(items.iter().cloned().map(Value::String).collect())
        }
    }
}

/// Where audit records go — the Store collaborator in the full system,
/// an in-memory fake in tests.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Test/demo sink that retains every record it receives.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: tokio::sync::Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, record: AuditRecord) {
        self.records.lock().await.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_retains_every_record() {
        let sink = InMemoryAuditSink::new();
        sink.record(AuditRecord {
            invocation_id: Uuid::new_v4(),
            principal_id: "user-1".to_string(),
            command_name: "server.enable".to_string(),
            arguments: HashMap::new(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            exit_code: Some(0),
            success: true,
            error_category: None,
            origin_ip: None,
            user_agent: None,
        })
        .await;
        assert_eq!(sink.records().await.len(), 1);
    }

    #[test]
    fn file_backed_arguments_are_redacted_to_a_byte_count() {
        let spec = bridge_registry::default_catalog()
            .into_iter()
            .find(|s| s.name == "config.set")
            .unwrap();
        let mut arguments = HashMap::new();
        arguments.insert(
            "configFile".to_string(),
            BoundValue::FileContent(serde_json::json!({"k": "v"})),
        );
        let redacted = redact_arguments(&spec, &arguments);
        assert!(matches!(
            redacted.get("configFile"),
            Some(AuditArgument::RedactedFileSize { .. })
        ));
    }
}
