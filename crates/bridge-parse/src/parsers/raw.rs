use bridge_registry::ErrorPatternRule;

use crate::event::{Channel, ParsedEvent, ParsedResult};
use crate::parser::{match_error_pattern, OutputParser};

/// No structural assumptions at all — every line becomes an `Output` event
/// verbatim (used by `cli.version` and other commands whose output is just
/// freeform text the caller displays as-is).
pub struct RawParser {
    error_patterns: Vec<ErrorPatternRule>,
    stderr_lines: Vec<String>,
    stdout_lines: Vec<String>,
}

impl RawParser {
    pub fn new(error_patterns: Vec<ErrorPatternRule>) -> Self {
        Self {
            error_patterns,
            stderr_lines: Vec::new(),
            stdout_lines: Vec::new(),
        }
    }
}

impl OutputParser for RawParser {
    fn reset(&mut self) {
        self.stderr_lines.clear();
        self.stdout_lines.clear();
    }

    fn parse_line(&mut self, channel: Channel, line: &str) -> Vec<ParsedEvent> {
        match channel {
            Channel::Stdout => self.stdout_lines.push(line.to_string()),
            Channel::Stderr => self.stderr_lines.push(line.to_string()),
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
            data: Some(serde_json::Value::String(self.stdout_lines.join("\n"))),
            error,
            warnings: Vec::new(),
            metadata: Default::default(),
        }
    }
}
