use bridge_registry::ErrorPatternRule;
use regex::Regex;
use serde_json::Value;

use crate::event::{Channel, ParsedEvent, ParsedResult};
use crate::parser::{match_error_pattern, OutputParser};

/// Parses JSON-shaped progress/state-change lines from a long-running
/// streaming command (e.g. `server.install`), falling back to a configured
/// free-text pattern for commands whose CLI prints plain progress/state
/// sentences instead of JSON (e.g. `progress: 33%`, `state: pending->running`),
/// and finally to a plain `Output` event for anything that matches neither.
pub struct ProgressParser {
    error_patterns: Vec<ErrorPatternRule>,
    progress_pattern: Option<Regex>,
    state_pattern: Option<Regex>,
    stderr_lines: Vec<String>,
    last_progress: Option<Value>,
}

impl ProgressParser {
    pub fn new(
        error_patterns: Vec<ErrorPatternRule>,
        progress_pattern: Option<Regex>,
        state_pattern: Option<Regex>,
    ) -> Self {
        Self {
            error_patterns,
            progress_pattern,
            state_pattern,
            stderr_lines: Vec::new(),
            last_progress: None,
        }
    }
}

fn as_progress(value: &Value) -> Option<ParsedEvent> {
    let fraction = value.get("progress").and_then(Value::as_f64)?;
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let step = value
        .get("step")
        .and_then(Value::as_str)
        .map(|s| s.to_string());
    Some(ParsedEvent::Progress {
        fraction,
        message,
        step,
    })
}

fn as_state_change(value: &Value) -> Option<ParsedEvent> {
    let entity_id = value.get("entityId").and_then(Value::as_str)?.to_string();
    let old_state = value.get("oldState").and_then(Value::as_str)?.to_string();
    let new_state = value.get("newState").and_then(Value::as_str)?.to_string();
    Some(ParsedEvent::StateChange {
        entity_id,
        old_state,
        new_state,
    })
}

/// Reads a `current/total` or `NN%` text match into a 0.0-1.0 fraction.
fn text_progress_fraction(captures: &regex::Captures<'_>) -> Option<f64> {
    if let Some(pct) = captures.name("pct") {
        return pct.as_str().parse::<f64>().ok().map(|pct| pct / 100.0);
    }
    let current = captures.name("current")?.as_str().parse::<f64>().ok()?;
    let total = captures.name("total")?.as_str().parse::<f64>().ok()?;
    if total == 0.0 {
        return None;
    }
    Some(current / total)
}

impl OutputParser for ProgressParser {
    fn reset(&mut self) {
        self.stderr_lines.clear();
        self.last_progress = None;
    }

    fn parse_line(&mut self, channel: Channel, line: &str) -> Vec<ParsedEvent> {
        if channel == Channel::Stderr {
            self.stderr_lines.push(line.to_string());
            return Vec::new();
        }

        if let Ok(value) = serde_json::from_str::<Value>(line) {
            if let Some(event) = as_state_change(&value) {
                return vec![event];
            }
            if let Some(event) = as_progress(&value) {
                self.last_progress = Some(value);
                return vec![event];
            }
            return vec![ParsedEvent::Output {
                raw_line: line.to_string(),
                parsed_structure: Some(value),
            }];
        }

        if let Some(captures) = self.state_pattern.as_ref().and_then(|p| p.captures(line)) {
            let old_state = captures.name("old").map(|m| m.as_str()).unwrap_or_default();
            let new_state = captures.name("new").map(|m| m.as_str()).unwrap_or_default();
            return vec![ParsedEvent::StateChange {
                entity_id: String::new(),
                old_state: old_state.to_string(),
                new_state: new_state.to_string(),
            }];
        }

        if let Some(captures) = self
            .progress_pattern
            .as_ref()
            .and_then(|p| p.captures(line))
        {
            if let Some(fraction) = text_progress_fraction(&captures) {
                return vec![ParsedEvent::Progress {
                    fraction,
                    message: line.trim().to_string(),
                    step: None,
                }];
            }
        }

        vec![ParsedEvent::Output {
            raw_line: line.to_string(),
            parsed_structure: None,
        }]
    }

    fn finalize(&mut self) -> ParsedResult {
        let error = match_error_pattern(&self.error_patterns, &self.stderr_lines.join("\n"));
        ParsedResult {
            success: error.is_none(),
            data: self.last_progress.take(),
            error,
            warnings: Vec::new(),
            metadata: Default::default(),
        }
    }
}
