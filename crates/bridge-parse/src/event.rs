use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

/// Which pipe a line of output was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// One unit of parsed output, per the Data Model's "Parsed Event" (§3).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ParsedEvent {
    Output {
        raw_line: String,
        parsed_structure: Option<Value>,
    },
    Progress {
        fraction: f64,
        message: String,
        step: Option<String>,
    },
    StateChange {
        entity_id: String,
        old_state: String,
        new_state: String,
    },
    Warning {
        message: String,
    },
    Error {
        category: String,
        message: String,
        suggestion: Option<String>,
    },
    /// Always the last event of an invocation's stream (Executor Pool's
    /// ordering guarantee, §4.4); constructed by the caller once the
    /// subprocess exits, not by a parser itself.
    Complete {
        success: bool,
        exit_code: Option<i32>,
        structured_result: Option<Value>,
    },
}

/// The aggregate outcome of parsing one invocation's output to completion.
#[derive(Debug, Clone, Default)]
pub struct ParsedResult {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<ParsedEvent>,
    pub warnings: Vec<String>,
    pub metadata: HashMap<String, String>,
}
